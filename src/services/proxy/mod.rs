pub mod director;
pub mod forwarder;

pub use director::{DirectError, build_outbound_request};
pub use forwarder::{ForwardError, Forwarder, HttpForwarder};
