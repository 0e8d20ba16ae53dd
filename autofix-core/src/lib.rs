pub mod fence;
pub mod gemini;
pub mod generator;
pub mod http;
pub mod issue;
pub mod language;
pub mod prompt;
pub mod recording;
pub mod repository;

pub use fence::strip_fences;
pub use gemini::*;
pub use generator::CodeGenerator;
pub use http::{build_http_client, USER_AGENT};
pub use issue::*;
pub use language::Language;
pub use prompt::*;
pub use recording::{
    CorrelationId, Direction, EventType, RecordedEvent, Sanitizer, ServiceType,
    CORRELATION_ID_HEADER,
};
pub use repository::*;
