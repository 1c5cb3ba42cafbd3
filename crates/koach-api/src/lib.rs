//! koach-api: wire client for the coach backend
//!
//! This crate owns the streaming `/coach` call, the incremental decoder
//! that turns a concatenated-JSON reply body into display fragments, and
//! the auxiliary REST reads (agent catalog, brand elements, profiles).

pub mod client;
pub mod decode;
pub mod error;
pub mod profile;
pub mod types;

pub use client::CoachClient;
pub use decode::{DEFAULT_AGENT_ID, FragmentDecoder, ReplyEvent, ReplyEventStream, decode_reply};
pub use error::{Error, Result};
pub use profile::ProfileSnapshot;
pub use types::{AgentInfo, BrandElement, ChatMessage, ChatRequest, Role, StreamEvent};
