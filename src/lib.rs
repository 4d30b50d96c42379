pub mod auth;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod notifier;
pub mod rate_limit_config;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod validation;

pub use config::Config;
pub use error::{GatewayError, NotifyError, Result};
pub use gateway::Gateway;
pub use notifier::Notifier;
pub use response::ApiResponse;
pub use server::{create_app, Server};
