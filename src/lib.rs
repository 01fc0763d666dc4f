pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod proxy;
pub mod regions;
pub mod server;
pub mod token;
pub mod translate;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use logging::SharedLogger;
pub use server::{build_router, AppState};
pub use upstream::UpstreamClient;
