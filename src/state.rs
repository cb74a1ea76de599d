/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 *   - dispatcher: route table + authenticator + forwarder, all read-only
 * - Clone is cheap (Arc inside)
 */
use std::sync::Arc;

use crate::services::Dispatcher;

#[derive(Clone, Debug)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}
