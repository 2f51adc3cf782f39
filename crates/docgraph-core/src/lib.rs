pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod session;
pub mod status;
pub mod stream;
pub mod transcript;
pub mod upload;

// Re-export main types for convenience
pub use client::{ApiClient, HealthStatus, QueryStream};
pub use config::Config;
pub use error::{ApiError, FileRejected, SendRejected};
pub use graph::{GraphSnapshot, GraphView, Selection};
pub use session::{Command, QueryEvent, Session, SessionEvent};
pub use status::{StatusKind, StatusMessage, StatusNotifier, StatusPhase};
pub use stream::{FrameDecoder, StreamFrame};
pub use transcript::{ChatEntry, ChatRole, ContextAnnex, Transcript};
pub use upload::{format_file_size, FileSelection, UploadFailure};
