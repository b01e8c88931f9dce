use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of events carried by a log stream. Payloads are decoded according
/// to the stream they were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Votes,
    Signins,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Votes => f.write_str("votes"),
            StreamKind::Signins => f.write_str("signins"),
        }
    }
}
