//! Path-prefix API gateway.
//!
//! A request to `/<route>/...` is authenticated with an HS256 bearer token,
//! checked against the route's allowed roles and forwarded to the route's
//! backend with the gateway's own service credential.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, DispatchError};
pub use services::{Dispatcher, RouteDefinition, RouteTable};
pub use state::AppState;
