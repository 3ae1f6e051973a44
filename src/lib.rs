//! Veilleur - tech-watch chat assistant
//!
//! A chat-bot process combining on-demand model-backed Q&A with unattended
//! background watchers that surface newly observed external items exactly
//! once each.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Request-handling path                     │
//! │   RateLimiter ──> SessionStore ──> CompletionClient           │
//! └──────────────────────────────────────────────────────────────┘
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Supervisor                            │
//! │  ┌───────────┐   ┌───────────┐   ┌──────────────┐            │
//! │  │ RssWatcher│   │ CveWatcher│   │WeatherWatcher│            │
//! │  │ durable   │   │ volatile  │   │ change cache │            │
//! │  │ dedup file│   │ seen set  │   │              │            │
//! │  └─────┬─────┘   └─────┬─────┘   └──────┬───────┘            │
//! │        └───────────────┴────────────────┘                    │
//! │                        │                                     │
//! │                 NotificationSink                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each watcher owns its dedup state and runs on its own cadence; an item
//! is committed as seen only once its notification is delivered (or the
//! gap is explicitly accepted, see the watcher docs).
//!
//! ## Modules
//!
//! - [`chat`]: rate limiting, sessions, and the interactive ask/clear path
//! - [`watch`]: the scheduler and the three watchers with their dedup state
//! - [`fetch`]: black-box fetchers for RSS, CVE and weather sources
//! - [`llm`]: the hosted-model completion seam
//! - [`notify`]: the notification sink seam and webhook delivery
//! - [`config`]: configuration with safe defaults and env overlay

pub mod chat;
pub mod config;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod notify;
pub mod watch;

pub use config::BotConfig;
pub use error::{Error, Result};
