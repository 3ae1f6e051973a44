//! Interactive request-handling path
//!
//! Per-user admission control, bounded conversation history, and the
//! ask/clear service invoked synchronously by the chat front end.

mod rate_limit;
mod service;
mod session;

pub use rate_limit::{Decision, RateLimiter};
pub use service::{AskOutcome, ChatService};
pub use session::{Role, SessionStore, Turn};
