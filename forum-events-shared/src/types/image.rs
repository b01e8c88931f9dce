use serde::{Deserialize, Serialize};

/// A stored image produced by the image pipeline.
///
/// Immutable once produced. Hydration replaces a user's avatar wholesale,
/// never field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub file_name: String,
    pub original_url: String,
    pub original_content_type: String,
    pub formatted_url: String,
    pub formatted_content_type: String,
}
