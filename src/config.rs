/*
 * Responsibility
 * - Load the JSON config file and merge environment overrides (.env included)
 * - Resolve per-route service credentials (GATEWAY_CREDENTIAL_<NAME>)
 * - Validate values (startup fails when something required is missing)
 *
 * The dispatch core never reads files or env vars; it only sees the
 * `Config` built here.
 */
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "config.json";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const CREDENTIAL_ENV_PREFIX: &str = "GATEWAY_CREDENTIAL_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Route {
        name: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
            ConfigError::Read { path, source } => {
                write!(f, "reading configuration from {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "parsing configuration {}: {}", path.display(), source)
            }
            ConfigError::Route { name, reason } => {
                write!(f, "invalid route '{}': {}", name, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// One proxied API as written in the config file.
///
/// `name` is both the path prefix (`/github`) and the suffix of the env var
/// holding the backend credential (`GATEWAY_CREDENTIAL_GITHUB`).
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiSettings {
    pub name: String,
    pub url: String,
    pub roles: Vec<String>,

    #[serde(skip)]
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    jwt: JwtSection,
    apis: Vec<ApiSettings>,
    api: ListenSection,
    log_conf: LogSection,
    upstream: UpstreamSection,
    cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JwtSection {
    secret: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListenSection {
    host: String,
    port: u16,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LogSection {
    log_level: String,
    log_file: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpstreamSection {
    connect_timeout_seconds: Option<u64>,
    read_timeout_seconds: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// `host:port`, handed to `TcpListener::bind` as-is so host names resolve.
    pub listen_addr: String,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub jwt_secret: String,
    pub apis: Vec<ApiSettings>,

    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,

    pub request_timeout: Duration,
    pub upstream_connect_timeout: Duration,
    pub upstream_read_timeout: Option<Duration>,
}

impl Config {
    /// Load `.env`, the config file (`GATEWAY_CONFIG` or `./config.json`) and
    /// the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = |key: &str| std::env::var(key).ok();

        let file = match env("GATEWAY_CONFIG") {
            Some(path) => read_file(Path::new(&path))?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    read_file(path)?
                } else {
                    FileConfig::default()
                }
            }
        };

        Self::merge(file, env)
    }

    /// Parse a config document and merge it with `env`.
    pub fn from_json(json: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let file = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Self::merge(file, env)
    }

    fn merge(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env_nonempty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let app_env = AppEnv::parse(env("APP_ENV").as_deref());

        let jwt_secret = env_nonempty("GATEWAY_JWT_SECRET").unwrap_or(file.jwt.secret);
        if jwt_secret.is_empty() {
            return Err(ConfigError::Missing("jwt.secret"));
        }

        let host = env_nonempty("GATEWAY_API_HOST").unwrap_or(file.api.host);
        let mut port = match env_nonempty("GATEWAY_API_PORT") {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("GATEWAY_API_PORT"))?,
            None => file.api.port,
        };
        if port == 0 {
            if let Some(p) = env_nonempty("PORT") {
                port = p.parse().map_err(|_| ConfigError::Invalid("PORT"))?;
            }
        }
        if port == 0 && host.is_empty() {
            port = DEFAULT_PORT;
        }
        let host = if host.is_empty() {
            DEFAULT_HOST.to_string()
        } else {
            host
        };
        let listen_addr = format!("{}:{}", host, port);

        let cors_allowed_origins = match env("CORS_ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => file.cors_allowed_origins,
        };

        let apis = file
            .apis
            .into_iter()
            .map(|mut api| {
                api.token = env(&credential_env_key(&api.name)).unwrap_or_default();
                api
            })
            .collect();

        let log_level = env_nonempty("GATEWAY_LOG_LEVEL")
            .or_else(|| Some(file.log_conf.log_level).filter(|s| !s.is_empty()));
        let log_file = env_nonempty("GATEWAY_LOG_FILE")
            .or_else(|| Some(file.log_conf.log_file).filter(|s| !s.is_empty()))
            .map(PathBuf::from);

        let request_timeout =
            Duration::from_secs(file.api.request_timeout_seconds.unwrap_or(60));
        let upstream_connect_timeout =
            Duration::from_secs(file.upstream.connect_timeout_seconds.unwrap_or(10));
        let upstream_read_timeout = file.upstream.read_timeout_seconds.map(Duration::from_secs);

        Ok(Self {
            listen_addr,
            app_env,
            cors_allowed_origins,
            jwt_secret,
            apis,
            log_level,
            log_file,
            request_timeout,
            upstream_connect_timeout,
            upstream_read_timeout,
        })
    }
}

/// `github` -> `GATEWAY_CREDENTIAL_GITHUB`
pub fn credential_env_key(route_name: &str) -> String {
    format!("{}{}", CREDENTIAL_ENV_PREFIX, route_name.to_uppercase())
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const SAMPLE: &str = r#"{
        "jwt": {"secret": "s3cret"},
        "apis": [
            {"name": "github", "url": "https://api.github.com/repos/org", "roles": ["admin"]},
            {"name": "stripe", "url": "https://api.stripe.com/v1", "roles": []}
        ],
        "log_conf": {"log_level": "debug"}
    }"#;

    #[test]
    fn loads_routes_in_file_order_with_env_credentials() {
        let config =
            Config::from_json(SAMPLE, env_of(&[("GATEWAY_CREDENTIAL_GITHUB", "ghtoken")])).unwrap();

        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.apis.len(), 2);
        assert_eq!(config.apis[0].name, "github");
        assert_eq!(config.apis[0].token, "ghtoken");
        assert_eq!(config.apis[0].roles, vec!["admin".to_string()]);
        assert_eq!(config.apis[1].name, "stripe");
        assert_eq!(config.apis[1].token, "");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn defaults_to_port_8080_when_nothing_is_set() {
        let config = Config::from_json(SAMPLE, env_of(&[])).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.app_env, AppEnv::Development);
    }

    #[test]
    fn port_env_fills_in_missing_port() {
        let config = Config::from_json(SAMPLE, env_of(&[("PORT", "9191")])).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9191");
    }

    #[test]
    fn env_overrides_file_values() {
        let config = Config::from_json(
            SAMPLE,
            env_of(&[
                ("GATEWAY_JWT_SECRET", "from-env"),
                ("GATEWAY_API_HOST", "127.0.0.1"),
                ("GATEWAY_API_PORT", "7000"),
                ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
                ("APP_ENV", "production"),
            ]),
        )
        .unwrap();

        assert_eq!(config.jwt_secret, "from-env");
        assert_eq!(config.listen_addr, "127.0.0.1:7000");
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(config.app_env.is_production());
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = Config::from_json(r#"{"apis": []}"#, env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("jwt.secret")));
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = Config::from_json(SAMPLE, env_of(&[("GATEWAY_API_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("GATEWAY_API_PORT")));
    }

    #[test]
    fn route_named_like_a_listen_setting_keeps_its_own_credential() {
        let doc = r#"{
            "jwt": {"secret": "s3cret"},
            "apis": [
                {"name": "host", "url": "http://h.internal", "roles": ["admin"]},
                {"name": "port", "url": "http://p.internal", "roles": ["admin"]}
            ]
        }"#;
        let config = Config::from_json(
            doc,
            env_of(&[
                ("GATEWAY_CREDENTIAL_HOST", "host-token"),
                ("GATEWAY_CREDENTIAL_PORT", "port-token"),
            ]),
        )
        .unwrap();

        assert_eq!(config.apis[0].token, "host-token");
        assert_eq!(config.apis[1].token, "port-token");
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    fn listen_overrides_do_not_become_credentials() {
        let doc = r#"{
            "jwt": {"secret": "s3cret"},
            "apis": [{"name": "host", "url": "http://h.internal", "roles": ["admin"]}]
        }"#;
        let config =
            Config::from_json(doc, env_of(&[("GATEWAY_API_HOST", "127.0.0.1")])).unwrap();

        assert_eq!(config.apis[0].token, "");
        assert_eq!(config.listen_addr, "127.0.0.1:0");
    }

    #[test]
    fn credential_key_uppercases_route_name() {
        assert_eq!(credential_env_key("github"), "GATEWAY_CREDENTIAL_GITHUB");
    }
}
