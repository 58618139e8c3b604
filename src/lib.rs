//! medikit-proxy: server-side proxy for medical assistant chat completions
//!
//! Forwards structured prompts for a fixed set of medical request kinds to
//! an OpenAI-style chat-completion service and relays the answer back to
//! the caller, either buffered as JSON or streamed as plain text. Keeps
//! the API credential on the server and centralizes prompt construction.

pub mod api;
pub mod config;
pub mod error;
pub mod prompts;
pub mod proxy;

pub use config::AppConfig;
pub use error::ProxyError;
pub use proxy::{build_router, run_server};
