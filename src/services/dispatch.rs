/*
 * Responsibility
 * - Per-request pipeline: match route -> authenticate -> authorize -> direct -> forward
 * - Turn any stage failure into a DispatchError (nothing is forwarded then)
 * - Relay the backend response untouched; a transport failure is reported
 *   to the observer and answered with a bare 502
 *
 * OPTIONS requests skip authentication/authorization (CORS preflight carries
 * no credential) and go straight to the director.
 */
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, header},
    response::Response,
};

use crate::error::DispatchError;
use crate::services::auth::{Authenticator, authorize};
use crate::services::observer::DispatchObserver;
use crate::services::proxy::{Forwarder, build_outbound_request, forwarder::bad_gateway};
use crate::services::routes::{RouteDefinition, RouteTable};

#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    authenticator: Authenticator,
    forwarder: Arc<dyn Forwarder>,
    observer: Arc<dyn DispatchObserver>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.len())
            .field("authenticator", &self.authenticator)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        authenticator: Authenticator,
        forwarder: Arc<dyn Forwarder>,
        observer: Arc<dyn DispatchObserver>,
    ) -> Self {
        Self {
            routes,
            authenticator,
            forwarder,
            observer,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub async fn handle(&self, request: Request<Body>) -> Result<Response, DispatchError> {
        let route = match self.routes.find_route(request.uri().path()) {
            Some(route) => route,
            None => {
                self.observer
                    .route_not_found(request.method(), request.uri().path());
                return Err(DispatchError::RouteNotFound);
            }
        };

        if request.method() == Method::OPTIONS {
            self.observer.preflight(route.name(), request.uri().path());
        } else if let Err(err) = self.check_access(&request, route) {
            self.observer
                .rejected(route.name(), request.method(), request.uri().path(), &err);
            return Err(err);
        }

        let outbound = match build_outbound_request(request, route) {
            Ok(outbound) => outbound,
            Err(err) => {
                self.observer.direct_failed(route.name(), &err);
                return Ok(bad_gateway());
            }
        };

        self.observer
            .forwarding(route.name(), outbound.method(), outbound.uri());
        match self.forwarder.forward(outbound).await {
            Ok(response) => Ok(response),
            Err(err) => {
                self.observer.upstream_failed(route.name(), &err);
                Ok(bad_gateway())
            }
        }
    }

    fn check_access(
        &self,
        request: &Request<Body>,
        route: &RouteDefinition,
    ) -> Result<(), DispatchError> {
        // A header that is not visible ASCII cannot be a bearer token.
        let authorization = request
            .headers()
            .get(header::AUTHORIZATION)
            .map(|v| v.to_str().unwrap_or_default());

        let claims = self.authenticator.authenticate(authorization)?;

        if !authorize(&claims.roles, route.allowed_roles()) {
            return Err(DispatchError::RoleNotPermitted);
        }
        Ok(())
    }
}
