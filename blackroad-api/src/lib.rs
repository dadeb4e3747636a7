//! BlackRoad API - Wire Contract and Dispatcher
//!
//! Maps the stable endpoint names (`memory/store`, `reasoning/evaluate`,
//! `coordination/publish`, `agent/find`, ...) onto the memory store, the
//! reasoning engine and the coordination bus. Transport, authentication and
//! serialization to bytes belong to the embedding process.

pub mod endpoint;
pub mod error;
pub mod platform;
pub mod session;
pub mod telemetry;
pub mod types;

pub use endpoint::Endpoint;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use platform::Platform;
pub use session::{AgentSession, LearnOutcome};
pub use telemetry::{init_tracing, init_tracing_pretty};
pub use types::*;
