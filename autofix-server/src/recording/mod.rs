pub mod logger;
pub mod middleware;

pub use autofix_core::recording::*;
pub use logger::RecordingLogger;
pub use middleware::{instrumented_client, RecordingMiddleware};
