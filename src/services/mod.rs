/*
 * Responsibility
 * - Gateway core: route table, caller authentication, role policy,
 *   request director, forwarding transport, dispatcher
 * - No axum Router / config access in here (handlers and app.rs wire it up)
 */
pub mod auth;
pub mod dispatch;
pub mod observer;
pub mod proxy;
pub mod routes;

pub use dispatch::Dispatcher;
pub use observer::{DispatchObserver, TracingObserver};
pub use routes::{RouteDefinition, RouteTable};
