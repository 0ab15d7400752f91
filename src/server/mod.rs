pub mod config;
mod http_layers;
pub mod metrics;
pub mod server;
mod shop_routes;
pub mod state;
mod sync_routes;
mod views;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use state::ServerState;
