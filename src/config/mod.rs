//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU64, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::assets::{DEFAULT_FALLBACK_IMAGE, LegacyHost, default_legacy_hosts};

mod cli;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const ENV_PREFIX: &str = "FOLIO";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CMS_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 1024;
const DEFAULT_S_MAXAGE_SECS: u64 = 300;
const DEFAULT_STALE_WHILE_REVALIDATE_SECS: u64 = 900;
const DEFAULT_ASSET_MAX_AGE_SECS: u64 = 31_536_000;
const DEFAULT_CSRF_HEADER: &str = "x-csrf-token";
const DEFAULT_CSRF_COOKIE: &str = "csrf_token";
const DEFAULT_SESSION_COOKIE: &str = "session_token";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cms: CmsSettings,
    pub cache: CacheSettings,
    pub http_cache: HttpCacheSettings,
    pub assets: AssetSettings,
    pub security: SecuritySettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// CMS connection snapshot. A missing URL is reported when the client is built.
#[derive(Clone)]
pub struct CmsSettings {
    pub url: Option<Url>,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for CmsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsSettings")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for CmsSettings {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout: Duration::from_secs(DEFAULT_CMS_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: NonZeroUsize,
}

/// `Cache-Control` windows for public responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpCacheSettings {
    pub s_maxage: NonZeroU64,
    pub stale_while_revalidate: u64,
    pub asset_max_age: NonZeroU64,
}

impl Default for HttpCacheSettings {
    fn default() -> Self {
        Self {
            s_maxage: NonZeroU64::new(DEFAULT_S_MAXAGE_SECS).unwrap_or(NonZeroU64::MIN),
            stale_while_revalidate: DEFAULT_STALE_WHILE_REVALIDATE_SECS,
            asset_max_age: NonZeroU64::new(DEFAULT_ASSET_MAX_AGE_SECS).unwrap_or(NonZeroU64::MIN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub legacy_hosts: Vec<LegacyHost>,
    pub fallback_image: String,
}

#[derive(Clone)]
pub struct SecuritySettings {
    pub csrf_header: String,
    pub csrf_cookie: String,
    pub session_cookie: String,
    pub revalidate_secret: Option<String>,
}

impl std::fmt::Debug for SecuritySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecuritySettings")
            .field("csrf_header", &self.csrf_header)
            .field("csrf_cookie", &self.csrf_cookie)
            .field("session_cookie", &self.session_cookie)
            .field(
                "revalidate_secret",
                &self.revalidate_secret.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            csrf_header: DEFAULT_CSRF_HEADER.to_string(),
            csrf_cookie: DEFAULT_CSRF_COOKIE.to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            revalidate_secret: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::CheckConfig) | None => {
            raw.apply_serve_overrides(&ServeOverrides::default())
        }
    }
    raw.apply_cms_overrides(&cli.cms);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cms: RawCmsSettings,
    cache: RawCacheSettings,
    http_cache: RawHttpCacheSettings,
    assets: RawAssetSettings,
    security: RawSecuritySettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(secret) = overrides.revalidate_secret.as_ref() {
            self.security.revalidate_secret = Some(secret.clone());
        }
    }

    fn apply_cms_overrides(&mut self, overrides: &CmsOverrides) {
        if let Some(url) = overrides.cms_url.as_ref() {
            self.cms.url = Some(url.clone());
        }
        if let Some(token) = overrides.cms_token.as_ref() {
            self.cms.token = Some(token.clone());
        }
        if let Some(timeout) = overrides.cms_timeout_seconds {
            self.cms.timeout_seconds = Some(timeout);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cms,
            cache,
            http_cache,
            assets,
            security,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cms: build_cms_settings(cms)?,
            cache: build_cache_settings(cache)?,
            http_cache: build_http_cache_settings(http_cache)?,
            assets: build_asset_settings(assets)?,
            security: build_security_settings(security)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cms_settings(cms: RawCmsSettings) -> Result<CmsSettings, LoadError> {
    let url = match non_blank(cms.url) {
        Some(value) => {
            let parsed = Url::parse(&value)
                .map_err(|err| LoadError::invalid("cms.url", format!("failed to parse: {err}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "cms.url",
                    "scheme must be http or https",
                ));
            }
            Some(parsed)
        }
        None => None,
    };

    let timeout_secs = cms.timeout_seconds.unwrap_or(DEFAULT_CMS_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "cms.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CmsSettings {
        url,
        token: non_blank(cms.token),
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_secs = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }
    if ttl_secs > MAX_CACHE_TTL_SECS {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            format!("must not exceed {MAX_CACHE_TTL_SECS} seconds"),
        ));
    }

    let max_entries = NonZeroUsize::new(cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES))
        .ok_or_else(|| LoadError::invalid("cache.max_entries", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        ttl: Duration::from_secs(ttl_secs),
        max_entries,
    })
}

fn build_http_cache_settings(
    http_cache: RawHttpCacheSettings,
) -> Result<HttpCacheSettings, LoadError> {
    let s_maxage = non_zero_u64(
        http_cache.s_maxage_seconds.unwrap_or(DEFAULT_S_MAXAGE_SECS),
        "http_cache.s_maxage_seconds",
    )?;
    let asset_max_age = non_zero_u64(
        http_cache
            .asset_max_age_seconds
            .unwrap_or(DEFAULT_ASSET_MAX_AGE_SECS),
        "http_cache.asset_max_age_seconds",
    )?;

    Ok(HttpCacheSettings {
        s_maxage,
        stale_while_revalidate: http_cache
            .stale_while_revalidate_seconds
            .unwrap_or(DEFAULT_STALE_WHILE_REVALIDATE_SECS),
        asset_max_age,
    })
}

fn build_asset_settings(assets: RawAssetSettings) -> Result<AssetSettings, LoadError> {
    let legacy_hosts = assets.legacy_hosts.unwrap_or_else(default_legacy_hosts);
    if legacy_hosts.iter().any(|host| host.pattern.trim().is_empty()) {
        return Err(LoadError::invalid(
            "assets.legacy_hosts",
            "host patterns must not be empty",
        ));
    }

    let fallback_image =
        non_blank(assets.fallback_image).unwrap_or_else(|| DEFAULT_FALLBACK_IMAGE.to_string());
    if !fallback_image.starts_with('/') {
        return Err(LoadError::invalid(
            "assets.fallback_image",
            "must be a root-relative path",
        ));
    }

    Ok(AssetSettings {
        legacy_hosts,
        fallback_image,
    })
}

fn build_security_settings(security: RawSecuritySettings) -> Result<SecuritySettings, LoadError> {
    let defaults = SecuritySettings::default();

    let csrf_header = non_blank(security.csrf_header)
        .unwrap_or(defaults.csrf_header)
        .to_ascii_lowercase();
    axum::http::HeaderName::from_bytes(csrf_header.as_bytes()).map_err(|err| {
        LoadError::invalid("security.csrf_header", format!("invalid header name: {err}"))
    })?;

    Ok(SecuritySettings {
        csrf_header,
        csrf_cookie: non_blank(security.csrf_cookie).unwrap_or(defaults.csrf_cookie),
        session_cookie: non_blank(security.session_cookie).unwrap_or(defaults.session_cookie),
        revalidate_secret: non_blank(security.revalidate_secret),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCmsSettings {
    url: Option<String>,
    token: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_seconds: Option<u64>,
    max_entries: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHttpCacheSettings {
    s_maxage_seconds: Option<u64>,
    stale_while_revalidate_seconds: Option<u64>,
    asset_max_age_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAssetSettings {
    legacy_hosts: Option<Vec<LegacyHost>>,
    fallback_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSecuritySettings {
    csrf_header: Option<String>,
    csrf_cookie: Option<String>,
    session_cookie: Option<String>,
    revalidate_secret: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
