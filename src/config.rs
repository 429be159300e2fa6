//! Host Configuration
//!
//! Environment-driven configuration for the shell. Remote locations are
//! derived from the page's own location at runtime so one build runs
//! unmodified across local, staging and production.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Local development page used when no page location is configured
pub const DEFAULT_PAGE_URL: &str = "http://local.vrittiai.com:3012";

const LOCAL_HOST_MARKER: &str = "local.vrittiai.com";

/// The page's own location (protocol without ':', hostname, effective port)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub protocol: String,
    pub hostname: String,
    pub port: u16,
}

impl PageLocation {
    /// Parse a page URL. Missing ports default to 443/80 by protocol.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(raw)?;
        let hostname = url
            .host_str()
            .ok_or(url::ParseError::EmptyHost)?
            .to_string();
        let protocol = url.scheme().to_string();
        let port = url
            .port()
            .unwrap_or(if protocol == "https" { 443 } else { 80 });
        Ok(Self {
            protocol,
            hostname,
            port,
        })
    }

    /// Hard-coded local fallback
    pub fn local_default(use_https: bool) -> Self {
        Self {
            protocol: if use_https { "https" } else { "http" }.to_string(),
            hostname: LOCAL_HOST_MARKER.to_string(),
            port: 3012,
        }
    }

    pub fn is_local(&self) -> bool {
        self.hostname.contains(LOCAL_HOST_MARKER)
    }

    /// `{protocol}://{host}` plus the port when it is not the protocol default
    pub fn origin(&self) -> String {
        let default_port = matches!(
            (self.protocol.as_str(), self.port),
            ("https", 443) | ("http", 80)
        );
        if default_port {
            format!("{}://{}", self.protocol, self.hostname)
        } else {
            format!("{}://{}:{}", self.protocol, self.hostname, self.port)
        }
    }

    /// First DNS label of the hostname
    pub fn subdomain(&self) -> &str {
        self.hostname.split('.').next().unwrap_or_default()
    }
}

/// Which static route tables the host mounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostVariant {
    /// Local login pages, account routes from the auth remote
    #[default]
    Standalone,
    /// `cloud.` subdomain: auth pages and the app body come from remotes
    Cloud,
}

impl HostVariant {
    pub fn from_location(location: &PageLocation) -> Self {
        if location.subdomain() == "cloud" {
            HostVariant::Cloud
        } else {
            HostVariant::Standalone
        }
    }
}

/// Auth backend endpoint paths, relative to the API base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub status: String,
    pub login: String,
    pub logout: String,
    pub logout_all: String,
    pub forgot_password: String,
    pub resend_reset_otp: String,
    pub verify_reset_otp: String,
    pub reset_password: String,
    pub refresh: String,
    pub csrf: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            status: "cloud-api/auth/status".to_string(),
            login: "auth/login".to_string(),
            logout: "cloud-api/auth/logout".to_string(),
            logout_all: "cloud-api/auth/logout-all".to_string(),
            forgot_password: "auth/forgot-password".to_string(),
            resend_reset_otp: "auth/resend-reset-otp".to_string(),
            verify_reset_otp: "auth/verify-reset-otp".to_string(),
            reset_password: "auth/reset-password".to_string(),
            refresh: "auth/refresh-tokens".to_string(),
            csrf: "/csrf/token".to_string(),
        }
    }
}

/// Complete host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Location the shell is served from
    pub page: PageLocation,
    /// Local dev port for the auth remote (`PUBLIC_AUTH_MF_PORT`)
    pub auth_mf_port: Option<u16>,
    /// Local dev port for the cloud remote (`PUBLIC_CLOUD_MF_PORT`)
    pub cloud_mf_port: Option<u16>,
    /// Production manifest base (`PUBLIC_MF_BASE_URL`), defaults to the page origin
    pub mf_base_url: Option<String>,
    /// Base URL every auth endpoint is joined onto
    pub api_base_url: Url,
    pub endpoints: AuthEndpoints,
    pub http_timeout: Duration,
    /// Minimum time a remote's loading placeholder stays up after a successful load
    pub remote_min_display: Duration,
    /// How long before expiry the access token is refreshed
    pub refresh_lead: Duration,
    pub csrf_enabled: bool,
}

impl HostConfig {
    /// Configuration for a page at `page` with every optional knob at its default
    pub fn for_page(page: PageLocation) -> Self {
        let api_base_url = default_api_base(&page);
        Self {
            page,
            auth_mf_port: None,
            cloud_mf_port: None,
            mf_base_url: None,
            api_base_url,
            endpoints: AuthEndpoints::default(),
            http_timeout: Duration::from_millis(30_000),
            remote_min_display: Duration::from_millis(500),
            refresh_lead: Duration::from_secs(60),
            csrf_enabled: true,
        }
    }

    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let use_https = match get("USE_HTTPS") {
            Some(v) => parse_bool("USE_HTTPS", &v)?,
            None => false,
        };

        // An unusable page location degrades to the local default rather than failing.
        let page = match get("NEXUS_PAGE_URL") {
            Some(raw) => PageLocation::parse(&raw).unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "NEXUS_PAGE_URL unusable, using local default");
                PageLocation::local_default(use_https)
            }),
            None => PageLocation::local_default(use_https),
        };

        let mut config = Self::for_page(page);
        config.auth_mf_port = get("PUBLIC_AUTH_MF_PORT")
            .map(|v| parse_number::<u16>("PUBLIC_AUTH_MF_PORT", &v))
            .transpose()?;
        config.cloud_mf_port = get("PUBLIC_CLOUD_MF_PORT")
            .map(|v| parse_number::<u16>("PUBLIC_CLOUD_MF_PORT", &v))
            .transpose()?;
        config.mf_base_url = get("PUBLIC_MF_BASE_URL").map(|v| v.trim_end_matches('/').to_string());

        if let Some(raw) = get("NEXUS_API_BASE_URL") {
            config.api_base_url = parse_base_url("NEXUS_API_BASE_URL", &raw)?;
        }
        if let Some(v) = get("NEXUS_HTTP_TIMEOUT_MS") {
            config.http_timeout =
                Duration::from_millis(parse_number("NEXUS_HTTP_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("NEXUS_REMOTE_MIN_DISPLAY_MS") {
            config.remote_min_display =
                Duration::from_millis(parse_number("NEXUS_REMOTE_MIN_DISPLAY_MS", &v)?);
        }
        if let Some(v) = get("NEXUS_REFRESH_LEAD_SECS") {
            config.refresh_lead = Duration::from_secs(parse_number("NEXUS_REFRESH_LEAD_SECS", &v)?);
        }
        if let Some(v) = get("NEXUS_CSRF_ENABLED") {
            config.csrf_enabled = parse_bool("NEXUS_CSRF_ENABLED", &v)?;
        }

        Ok(config)
    }

    pub fn variant(&self) -> HostVariant {
        HostVariant::from_location(&self.page)
    }
}

fn default_api_base(page: &PageLocation) -> Url {
    let raw = format!("{}/api/", page.origin());
    // Origins built from a parsed PageLocation always re-parse; the local default is the fallback.
    Url::parse(&raw).unwrap_or_else(|_| {
        Url::parse(&format!("{}/api/", PageLocation::local_default(false).origin()))
            .unwrap_or_else(|_| unreachable!("static fallback URL parses"))
    })
}

/// Parse a base URL, forcing a trailing slash so relative joins keep the path
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|source| ConfigError::InvalidUrl {
        key: key.to_string(),
        value: raw.to_string(),
        source,
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}
