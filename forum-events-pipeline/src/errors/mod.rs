mod consumer;
mod hydration;
mod log;
mod orchestrator;

pub use consumer::ConsumerError;
pub use hydration::HydrationError;
pub use log::LogError;
pub use orchestrator::OrchestratorError;
