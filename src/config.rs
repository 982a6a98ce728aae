//! Configuration handling for the DB router.
//!
//! Two layers: [`Config`] holds the CLI arguments and environment variables
//! for the server itself, and [`ProxyConfig`] describes the routed backends,
//! read from a properties file:
//!
//! ```text
//! items=2
//! db0_driver=mysql
//! db0_url=mysql://localhost/orders
//! db0_name=orders
//! db0_user=root
//! db0_password=secret
//! db0_regexp=^INSERT
//! db1_url=sqlite:./reports.db
//! db1_name=reports
//! db1_regexp=^SELECT
//! default=reports
//! ```

use crate::error::{RouterError, RouterResult};
use crate::models::{BackendConfig, DatabaseType};
use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "./config.properties";
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// The routed backends and the optional default.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub backends: Vec<BackendConfig>,
    pub default: Option<String>,
}

impl ProxyConfig {
    /// Read and parse a properties file.
    pub fn from_file(path: impl AsRef<Path>) -> RouterResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RouterError::config(format!(
                "Properties file {} is not available: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_properties(&text)
    }

    /// Parse the properties text.
    pub fn from_properties(text: &str) -> RouterResult<Self> {
        let props = parse_properties(text);

        let items = props
            .get("items")
            .ok_or_else(|| RouterError::config("Unknown number of connections: 'items' is missing"))?;
        let items: usize = items
            .trim()
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| RouterError::config(format!("Invalid number of connections: {}", items)))?;

        let mut backends: Vec<BackendConfig> = Vec::with_capacity(items);
        for i in 0..items {
            let backend = Self::backend_at(&props, i)?;
            if backends.iter().any(|b| b.name == backend.name) {
                return Err(RouterError::DuplicateBackend { name: backend.name });
            }
            backends.push(backend);
        }

        let default = props
            .get("default")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(name) = &default {
            if !backends.iter().any(|b| &b.name == name) {
                return Err(RouterError::unknown_backend(name));
            }
        }

        Ok(Self { backends, default })
    }

    fn backend_at(props: &HashMap<String, String>, i: usize) -> RouterResult<BackendConfig> {
        let required = |field: &str| {
            let key = format!("db{}_{}", i, field);
            props
                .get(&key)
                .ok_or_else(|| RouterError::config(format!("Missing key {}", key)))
        };
        let optional = |field: &str| props.get(&format!("db{}_{}", i, field)).map(String::as_str);

        let name = required("name")?;
        let url = required("url")?;
        let pattern = required("regexp")?;
        let url = merge_credentials(url, optional("user"), optional("password"))
            .map_err(|e| RouterError::config(format!("Backend '{}': {}", name, e)))?;

        Ok(BackendConfig::new(name.as_str(), url, pattern.as_str(), optional("driver"))?)
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name.as_str()).collect()
    }
}

/// Parse a Java-style properties file.
///
/// `#` and `!` start comment lines. A key ends at the first unescaped `=`,
/// `:` or whitespace. A line ending in an odd number of backslashes continues
/// on the next line. Escapes such as `\\`, `\t` and `\uXXXX` are decoded in
/// keys and values.
pub fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    let mut pending = String::new();

    for raw in text.lines() {
        let line = raw.trim_start_matches(BLANK);
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }
        if continues(line) {
            pending.push_str(&line[..line.len() - 1]);
            continue;
        }
        pending.push_str(line);
        let entry = std::mem::take(&mut pending);
        if let Some((key, value)) = split_entry(&entry) {
            props.insert(key, value);
        }
    }
    if let Some((key, value)) = split_entry(&pending) {
        props.insert(key, value);
    }
    props
}

const BLANK: [char; 3] = [' ', '\t', '\x0c'];

fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(entry: &str) -> Option<(String, String)> {
    let mut escaped = false;
    let mut key_end = entry.len();
    for (i, c) in entry.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let mut value = entry[key_end..].trim_start_matches(BLANK);
    if let Some(rest) = value.strip_prefix(['=', ':']) {
        value = rest.trim_start_matches(BLANK);
    }
    let key = unescape(&entry[..key_end]);
    (!key.is_empty()).then(|| (key, unescape(value)))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Fold `dbN_user` / `dbN_password` into the URL, replacing any credentials
/// already present. A `jdbc:` prefix is dropped.
pub fn merge_credentials(
    url: &str,
    user: Option<&str>,
    password: Option<&str>,
) -> Result<String, String> {
    let url = url.trim();
    let url = url.strip_prefix("jdbc:").unwrap_or(url);
    if user.is_none() && password.is_none() {
        return Ok(url.to_string());
    }
    if DatabaseType::from_connection_string(url) == Some(DatabaseType::SQLite) {
        return Err("SQLite does not take a user or password".to_string());
    }

    let mut parsed = Url::parse(url).map_err(|e| format!("Invalid URL: {e}"))?;
    if let Some(user) = user {
        parsed
            .set_username(user)
            .map_err(|_| "URL cannot carry a user name".to_string())?;
    }
    if let Some(password) = password {
        parsed
            .set_password(Some(password))
            .map_err(|_| "URL cannot carry a password".to_string())?;
    }
    Ok(parsed.to_string())
}

/// Configuration for the DB router server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-router",
    about = "Routes SQL queries across several databases behind one session, served over MCP",
    version,
    author
)]
pub struct Config {
    /// Properties file describing the routed backends
    #[arg(
        short,
        long,
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH,
        env = "ROUTER_CONFIG"
    )]
    pub config: PathBuf,

    /// Overrides the `default` entry of the properties file
    #[arg(long, value_name = "NAME", env = "ROUTER_DEFAULT_BACKEND")]
    pub default_backend: Option<String>,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "ROUTER_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output (disabled by default to avoid interfering with stdio transport)
    #[arg(long, env = "MCP_ENABLE_LOGS")]
    pub enable_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            default_backend: None,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            log_level: "info".to_string(),
            json_logs: false,
            enable_logs: false,
        }
    }

    /// Load the backends file, applying the `--default-backend` override.
    pub fn load_proxy_config(&self) -> RouterResult<ProxyConfig> {
        let mut proxy = ProxyConfig::from_file(&self.config)?;
        if let Some(name) = &self.default_backend {
            if !proxy.backends.iter().any(|b| &b.name == name) {
                return Err(RouterError::unknown_backend(name));
            }
            proxy.default = Some(name.clone());
        }
        Ok(proxy)
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
