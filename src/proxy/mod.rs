//! HTTP proxy server

mod dispatcher;
mod handler;
pub mod server;
pub mod streaming;

pub use dispatcher::UpstreamClient;
pub use handler::AssistantHandler;
pub use server::{build_router, run_server, ProxyState};
pub use streaming::DeltaDecoder;
