//! koach-session: conversation state and turn orchestration
//!
//! One [`Session`] per conversation: it owns the transcript, the active
//! agent, the last transport error, and the profile snapshot used for
//! "newly saved" notifications. Turns run strictly sequentially.

pub mod error;
pub mod session;
pub mod transcript;
pub mod transport;

pub use error::{Error, Result};
pub use session::{Session, strip_agent_prefix};
pub use transcript::format_transcript;
pub use transport::CoachTransport;
