/*
 * Responsibility
 * - RouteDefinition: path prefix -> backend origin + service credential + roles
 * - RouteTable: ordered lookup, first registered match wins
 *
 * Built once at startup and shared read-only (Arc) by every request task.
 * Overlapping prefixes are not detected; registration order decides.
 */
use std::collections::HashSet;

use axum::http::HeaderValue;
use url::Url;

use crate::config::{ApiSettings, ConfigError};

/// Matches `/<name>` exactly or `/<name>/...`. Case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatcher {
    prefix: String,
}

impl PathMatcher {
    pub fn new(name: &str) -> Self {
        Self {
            prefix: format!("/{}", name),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Remove the prefix, leaving a path that always starts with `/`.
    ///
    /// `/github` -> `/`, `/github/` -> `/`, `/github/issues` -> `/issues`.
    /// Returns `None` when the path does not match.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteDefinition {
    name: String,
    matcher: PathMatcher,
    backend: Url,
    // `Bearer <credential>`, marked sensitive so Debug never prints it.
    service_authorization: Option<HeaderValue>,
    allowed_roles: HashSet<String>,
}

impl RouteDefinition {
    pub fn new(
        name: impl Into<String>,
        url: &str,
        credential: impl Into<String>,
        roles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::Route {
                name,
                reason: "name must be a single non-empty path segment".to_string(),
            });
        }

        let backend = Url::parse(url).map_err(|e| ConfigError::Route {
            name: name.clone(),
            reason: format!("invalid url {}: {}", url, e),
        })?;
        if backend.host_str().is_none() {
            return Err(ConfigError::Route {
                name,
                reason: format!("url {} has no host", url),
            });
        }

        let credential = credential.into();
        let service_authorization = if credential.is_empty() {
            None
        } else {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", credential)).map_err(
                |_| ConfigError::Route {
                    name: name.clone(),
                    reason: "backend credential is not a valid header value".to_string(),
                },
            )?;
            value.set_sensitive(true);
            Some(value)
        };

        Ok(Self {
            matcher: PathMatcher::new(&name),
            name,
            backend,
            service_authorization,
            allowed_roles: roles.into_iter().map(Into::into).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    pub fn backend(&self) -> &Url {
        &self.backend
    }

    /// Authorization value sent to the backend; `None` when no credential is configured.
    pub fn service_authorization(&self) -> Option<&HeaderValue> {
        self.service_authorization.as_ref()
    }

    pub fn allowed_roles(&self) -> &HashSet<String> {
        &self.allowed_roles
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteDefinition>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDefinition>) -> Self {
        Self { routes }
    }

    pub fn from_settings(apis: &[ApiSettings]) -> Result<Self, ConfigError> {
        let routes = apis
            .iter()
            .map(|api| {
                RouteDefinition::new(api.name.as_str(), &api.url, api.token.as_str(), &api.roles)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    pub fn find_route(&self, path: &str) -> Option<&RouteDefinition> {
        self.routes.iter().find(|r| r.matcher.matches(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.routes.iter()
    }
}
