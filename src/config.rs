use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs, net::SocketAddr, str::FromStr};

use http::{HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use webrtc::ice_transport::ice_server::RTCIceServer;

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub log: Log,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Http {
    #[serde(default = "default_http_listen")]
    pub listen: SocketAddr,
    /// Largest SDP offer accepted, in bytes
    #[serde(default = "default_max_offer_bytes")]
    pub max_offer_bytes: usize,
    #[serde(default)]
    pub cors: Cors,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Cors {
    #[serde(default = "default_allow_origins")]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_allow_methods")]
    pub allow_methods: Vec<String>,
    #[serde(default = "default_allow_headers")]
    pub allow_headers: Vec<String>,
    #[serde(default = "default_expose_headers")]
    pub expose_headers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IceServer {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub credential: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Session {
    /// Deadline for ICE candidate gathering, in milliseconds
    #[serde(default = "default_gather_timeout_ms")]
    pub gather_timeout_ms: u64,
    /// Offer loopback addresses as host candidates, for publishers on the same machine
    #[serde(default)]
    pub include_loopback_candidates: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Output {
    /// Directory the per-track payload files are written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_http_listen() -> SocketAddr {
    SocketAddr::from_str(&format!(
        "0.0.0.0:{}",
        env::var("PORT").unwrap_or(String::from("80"))
    ))
    .expect("invalid listen address")
}

fn default_max_offer_bytes() -> usize {
    64 * 1024
}

fn default_allow_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_allow_methods() -> Vec<String> {
    ["GET", "POST", "OPTIONS"].map(String::from).to_vec()
}

fn default_allow_headers() -> Vec<String> {
    ["Content-Type", "Authorization"].map(String::from).to_vec()
}

fn default_expose_headers() -> Vec<String> {
    vec!["Content-Type".to_string()]
}

fn default_gather_timeout_ms() -> u64 {
    10_000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    env::var("LOG_LEVEL").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug".to_string()
        } else {
            "info".to_string()
        }
    })
}

impl Default for Http {
    fn default() -> Self {
        Self {
            listen: default_http_listen(),
            max_offer_bytes: default_max_offer_bytes(),
            cors: Default::default(),
        }
    }
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            allow_origins: default_allow_origins(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
            expose_headers: default_expose_headers(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            gather_timeout_ms: default_gather_timeout_ms(),
            include_loopback_candidates: false,
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl From<IceServer> for RTCIceServer {
    fn from(val: IceServer) -> Self {
        RTCIceServer {
            urls: val.urls,
            username: val.username,
            credential: val.credential,
            ..Default::default()
        }
    }
}

impl Session {
    pub fn gather_timeout(&self) -> Duration {
        Duration::from_millis(self.gather_timeout_ms)
    }
}

impl Cors {
    pub fn layer(&self) -> anyhow::Result<CorsLayer> {
        let origin = if self.allow_origins.iter().any(|o| o == "*") {
            AllowOrigin::from(Any)
        } else {
            AllowOrigin::list(
                self.allow_origins
                    .iter()
                    .map(|o| o.parse::<HeaderValue>())
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };
        let methods = self
            .allow_methods
            .iter()
            .map(|m| Method::from_bytes(m.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(methods)
            .allow_headers(parse_headers(&self.allow_headers)?)
            .expose_headers(parse_headers(&self.expose_headers)?))
    }
}

fn parse_headers(names: &[String]) -> anyhow::Result<Vec<HeaderName>> {
    Ok(names
        .iter()
        .map(|n| HeaderName::from_bytes(n.as_bytes()))
        .collect::<Result<Vec<_>, _>>()?)
}

impl Config {
    pub fn parse(path: Option<String>) -> anyhow::Result<Self> {
        let result = match path {
            Some(path) => fs::read_to_string(path)?,
            None => fs::read_to_string("whipdump.toml")
                .or(fs::read_to_string("/etc/whipdump/whipdump.toml"))
                .unwrap_or("".to_string()),
        };
        let cfg: Self = toml::from_str(result.as_str())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.http.max_offer_bytes == 0 {
            anyhow::bail!("http.max_offer_bytes must be greater than 0");
        }
        if self.session.gather_timeout_ms == 0 {
            anyhow::bail!("session.gather_timeout_ms must be greater than 0");
        }
        let _cors = self
            .http
            .cors
            .layer()
            .map_err(|e| anyhow::anyhow!("cors config error: {}", e))?;
        for ice_server in self.ice_servers.iter() {
            if ice_server.urls.is_empty() {
                anyhow::bail!("ice_server error: urls cannot be empty");
            }
        }
        Ok(())
    }
}
