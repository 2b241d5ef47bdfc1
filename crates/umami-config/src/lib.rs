//! Configuration for the Umami exporter.
//!
//! Layered with figment: built-in defaults, then an optional TOML file,
//! then `UMAMI_*` environment variables, then `EXPORTER_PORT`. The raw
//! layer is validated into an [`ExporterConfig`] that hands out the
//! transport, credentials and refresh settings the other crates take.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;

use umami_api::{Credentials, MetricType, TlsMode, TransportConfig};
use umami_core::{
    DEFAULT_CONCURRENCY, DEFAULT_METRIC_LIMIT, DEFAULT_REFRESH_INTERVAL, RefreshConfig,
};

pub const ENV_PREFIX: &str = "UMAMI_";
pub const PORT_ENV: &str = "EXPORTER_PORT";
pub const DEFAULT_PORT: u16 = 9465;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing required setting '{field}' (set {env})")]
    Missing { field: &'static str, env: &'static str },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Raw layer ───────────────────────────────────────────────────────

/// Breakdown list as written in TOML (`["url", "os"]`) or in the
/// environment (`url,os`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MetricTypeList {
    List(Vec<String>),
    Csv(String),
}

impl MetricTypeList {
    fn items(&self) -> Vec<&str> {
        match self {
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::Csv(csv) => csv.split(',').collect(),
        }
    }
}

/// Settings as merged from all layers, before validation.
///
/// String-typed settings accept any scalar: the environment layer turns
/// `UMAMI_PASSWORD=1234` into a number, which is still a valid password.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RawConfig {
    #[serde(deserialize_with = "lossy_string")]
    pub url: Option<String>,
    #[serde(deserialize_with = "lossy_string")]
    pub username: Option<String>,
    #[serde(deserialize_with = "lossy_string")]
    pub password: Option<String>,
    pub port: u16,
    #[serde(deserialize_with = "lossy_string")]
    pub refresh_interval: Option<String>,
    pub concurrency: usize,
    /// A positive row cap, or `none` to omit the cap entirely.
    #[serde(deserialize_with = "lossy_string")]
    pub metric_limit: Option<String>,
    pub metric_types: Option<MetricTypeList>,
    #[serde(deserialize_with = "lossy_string")]
    pub http_timeout: Option<String>,
    #[serde(deserialize_with = "lossy_string")]
    pub stats_window: Option<String>,
    pub ca_cert: Option<PathBuf>,
    pub insecure: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            port: DEFAULT_PORT,
            refresh_interval: Some("1m".into()),
            concurrency: DEFAULT_CONCURRENCY,
            metric_limit: Some(DEFAULT_METRIC_LIMIT.to_string()),
            metric_types: Some(MetricTypeList::List(
                MetricType::DEFAULTS.iter().map(ToString::to_string).collect(),
            )),
            http_timeout: Some("15s".into()),
            stats_window: Some("30d".into()),
            ca_cert: None,
            insecure: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn lossy_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(de)?.map(|scalar| match scalar {
        Scalar::Text(s) => s,
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

// ── Validated config ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Umami root URL.
    pub url: Url,
    pub credentials: Credentials,
    /// Port the `/metrics` endpoint listens on.
    pub port: u16,
    pub refresh_interval: Duration,
    pub concurrency: usize,
    /// `None` omits the `limit` query parameter.
    pub metric_limit: Option<u32>,
    pub metric_types: Vec<MetricType>,
    pub http_timeout: Duration,
    /// Trailing window for stats and breakdown queries.
    pub stats_window: chrono::Duration,
    pub ca_cert: Option<PathBuf>,
    pub insecure: bool,
}

impl ExporterConfig {
    pub fn transport(&self) -> TransportConfig {
        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref path) = self.ca_cert {
            TlsMode::CustomCa(path.clone())
        } else {
            TlsMode::System
        };

        TransportConfig {
            tls,
            timeout: self.http_timeout,
        }
    }

    pub fn refresh(&self) -> RefreshConfig {
        RefreshConfig {
            concurrency: self.concurrency,
            metric_limit: self.metric_limit,
            metric_types: self.metric_types.clone(),
        }
    }
}

impl RawConfig {
    pub fn validate(self) -> Result<ExporterConfig, ConfigError> {
        let url = required(self.url, "url", "UMAMI_URL")?;
        let url = normalize_url(&url)?;
        let username = required(self.username, "username", "UMAMI_USERNAME")?;
        let password = required(self.password, "password", "UMAMI_PASSWORD")?;

        if self.port == 0 {
            return Err(invalid("port", "must be non-zero"));
        }

        let mut refresh_interval =
            duration("refresh_interval", self.refresh_interval.as_deref(), "1m")?;
        if refresh_interval.is_zero() {
            refresh_interval = DEFAULT_REFRESH_INTERVAL;
        }
        let metric_limit = metric_limit(self.metric_limit.as_deref())?;
        let http_timeout = duration("http_timeout", self.http_timeout.as_deref(), "15s")?;
        let stats_window = duration("stats_window", self.stats_window.as_deref(), "30d")?;
        let stats_window = chrono::Duration::from_std(stats_window)
            .map_err(|e| invalid("stats_window", e.to_string()))?;

        let metric_types = match self.metric_types {
            Some(list) => parse_metric_types(&list.items())?,
            None => MetricType::DEFAULTS.to_vec(),
        };

        Ok(ExporterConfig {
            url,
            credentials: Credentials {
                username,
                password: SecretString::from(password),
            },
            port: self.port,
            refresh_interval,
            concurrency: if self.concurrency == 0 {
                DEFAULT_CONCURRENCY
            } else {
                self.concurrency
            },
            metric_limit,
            metric_types,
            http_timeout,
            stats_window,
            ca_cert: self.ca_cert,
            insecure: self.insecure,
        })
    }
}

fn required(
    value: Option<String>,
    field: &'static str,
    env: &'static str,
) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { field, env })
}

/// Parse the Umami root, assuming `https://` when no scheme is given.
fn normalize_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim_end_matches('/');
    let with_scheme = if raw.contains("://") {
        raw.to_owned()
    } else {
        format!("https://{raw}")
    };

    let url = Url::parse(&with_scheme).map_err(|e| invalid("url", format!("{e}: {raw}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(
            "url",
            format!("unsupported scheme '{other}', expected http or https"),
        )),
    }
}

fn duration(field: &str, raw: Option<&str>, default: &str) -> Result<Duration, ConfigError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default);
    humantime::parse_duration(raw).map_err(|e| invalid(field, format!("'{raw}': {e}")))
}

/// `none` disables the cap. Zero, negative or blank values fall back to
/// [`DEFAULT_METRIC_LIMIT`].
fn metric_limit(raw: Option<&str>) -> Result<Option<u32>, ConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Some(DEFAULT_METRIC_LIMIT));
    };
    if raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let n: i64 = raw
        .parse()
        .map_err(|_| invalid("metric_limit", format!("expected a number or 'none', got '{raw}'")))?;
    if n <= 0 {
        return Ok(Some(DEFAULT_METRIC_LIMIT));
    }
    u32::try_from(n)
        .map(Some)
        .map_err(|_| invalid("metric_limit", format!("'{raw}' is too large")))
}

/// Parse breakdown names, dropping blanks and duplicates. An empty list
/// means the defaults.
fn parse_metric_types(items: &[&str]) -> Result<Vec<MetricType>, ConfigError> {
    let mut types = Vec::new();
    for item in items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let parsed = MetricType::from_str(item)
            .map_err(|_| invalid("metric_types", format!("unknown metric type '{item}'")))?;
        if !types.contains(&parsed) {
            types.push(parsed);
        }
    }

    if types.is_empty() {
        types = MetricType::DEFAULTS.to_vec();
    }
    Ok(types)
}

// ── Config loading ──────────────────────────────────────────────────

/// The full provider stack. `path` is an optional TOML file.
pub fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(RawConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(Env::prefixed(ENV_PREFIX))
        .merge(Env::raw().only(&[PORT_ENV]).map(|_| "port".into()))
}

/// Load and validate the exporter configuration.
///
/// An explicitly named file must exist; without one only defaults and
/// the environment apply.
pub fn load(path: Option<&Path>) -> Result<ExporterConfig, ConfigError> {
    if let Some(path) = path {
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
    }
    from_figment(&figment(path))
}

pub fn from_figment(figment: &Figment) -> Result<ExporterConfig, ConfigError> {
    let raw: RawConfig = figment.extract()?;
    raw.validate()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn base_env(jail: &mut Jail) {
        jail.set_env("UMAMI_URL", "https://analytics.example.com");
        jail.set_env("UMAMI_USERNAME", "admin");
        jail.set_env("UMAMI_PASSWORD", "hunter2");
    }

    fn check(result: Result<ExporterConfig, ConfigError>) -> figment::error::Result<ExporterConfig> {
        result.map_err(|e| e.to_string().into())
    }

    #[test]
    fn defaults_apply_with_only_required_settings() {
        Jail::expect_with(|jail| {
            base_env(jail);
            let config = check(load(None))?;

            assert_eq!(config.url.as_str(), "https://analytics.example.com/");
            assert_eq!(config.credentials.username, "admin");
            assert_eq!(config.credentials.password.expose_secret(), "hunter2");
            assert_eq!(config.port, DEFAULT_PORT);
            assert_eq!(config.refresh_interval, Duration::from_secs(60));
            assert_eq!(config.concurrency, 5);
            assert_eq!(config.metric_limit, Some(100));
            assert_eq!(config.metric_types, MetricType::DEFAULTS.to_vec());
            assert_eq!(config.http_timeout, Duration::from_secs(15));
            assert_eq!(config.stats_window, chrono::Duration::days(30));
            assert!(matches!(config.transport().tls, TlsMode::System));
            Ok(())
        });
    }

    #[test]
    fn missing_url_is_reported() {
        Jail::expect_with(|jail| {
            jail.set_env("UMAMI_USERNAME", "admin");
            jail.set_env("UMAMI_PASSWORD", "pw");

            let err = load(None).unwrap_err();
            assert!(matches!(err, ConfigError::Missing { field: "url", .. }));
            assert!(err.to_string().contains("UMAMI_URL"));
            Ok(())
        });
    }

    #[test]
    fn env_overrides_and_edge_values() {
        Jail::expect_with(|jail| {
            base_env(jail);
            jail.set_env("UMAMI_URL", "stats.internal:3000/");
            jail.set_env("UMAMI_PASSWORD", "1234");
            jail.set_env("UMAMI_CONCURRENCY", "0");
            jail.set_env("UMAMI_METRIC_LIMIT", "0");
            jail.set_env("UMAMI_METRIC_TYPES", "URL, os,,url");
            jail.set_env("UMAMI_REFRESH_INTERVAL", "5m 30s");
            jail.set_env("EXPORTER_PORT", "9100");
            let config = check(load(None))?;

            assert_eq!(config.url.as_str(), "https://stats.internal:3000/");
            assert_eq!(config.credentials.password.expose_secret(), "1234");
            assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
            assert_eq!(config.metric_limit, Some(DEFAULT_METRIC_LIMIT));
            assert_eq!(config.metric_types, vec![MetricType::Url, MetricType::Os]);
            assert_eq!(config.refresh_interval, Duration::from_secs(330));
            assert_eq!(config.port, 9100);
            Ok(())
        });
    }

    #[test]
    fn zero_refresh_interval_uses_default() {
        Jail::expect_with(|jail| {
            base_env(jail);
            jail.set_env("UMAMI_REFRESH_INTERVAL", "0s");
            let config = check(load(None))?;

            assert_eq!(config.refresh_interval, DEFAULT_REFRESH_INTERVAL);
            Ok(())
        });
    }

    #[test]
    fn metric_limit_none_omits_the_cap() {
        Jail::expect_with(|jail| {
            base_env(jail);
            jail.set_env("UMAMI_METRIC_LIMIT", "None");
            assert_eq!(check(load(None))?.metric_limit, None);

            jail.set_env("UMAMI_METRIC_LIMIT", "25");
            assert_eq!(check(load(None))?.metric_limit, Some(25));

            jail.set_env("UMAMI_METRIC_LIMIT", "-3");
            assert_eq!(check(load(None))?.metric_limit, Some(DEFAULT_METRIC_LIMIT));
            Ok(())
        });
    }

    #[test]
    fn env_wins_over_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "exporter.toml",
                r#"
                url = "http://umami.lan"
                username = "file-user"
                password = "file-pass"
                concurrency = 8
                metric_types = ["browser", "country"]
                insecure = true
                "#,
            )?;
            jail.set_env("UMAMI_USERNAME", "env-user");
            let config = check(load(Some(Path::new("exporter.toml"))))?;

            assert_eq!(config.url.as_str(), "http://umami.lan/");
            assert_eq!(config.credentials.username, "env-user");
            assert_eq!(config.concurrency, 8);
            assert_eq!(
                config.metric_types,
                vec![MetricType::Browser, MetricType::Country]
            );
            assert!(matches!(
                config.transport().tls,
                TlsMode::DangerAcceptInvalid
            ));
            Ok(())
        });
    }

    #[test]
    fn file_layer_without_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            url = "https://a.example/"
            username = "u"
            password = "p"
            stats_window = "7d"
            ca_cert = "/etc/ssl/umami.pem"
            "#
        )
        .unwrap();

        let figment =
            Figment::from(Serialized::defaults(RawConfig::default())).merge(Toml::file(file.path()));
        let config = from_figment(&figment).unwrap();

        assert_eq!(config.stats_window, chrono::Duration::days(7));
        assert!(matches!(
            config.transport().tls,
            TlsMode::CustomCa(ref p) if p == Path::new("/etc/ssl/umami.pem")
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            ("metric_types", "unknown metric type 'pageviews'"),
            ("http_timeout", "'soon'"),
            ("url", "unsupported scheme 'ftp'"),
            ("metric_limit", "expected a number or 'none'"),
        ];
        for (field, reason) in cases {
            let mut raw = RawConfig {
                url: Some("https://a.example".into()),
                username: Some("u".into()),
                password: Some("p".into()),
                ..RawConfig::default()
            };
            match field {
                "metric_types" => raw.metric_types = Some(MetricTypeList::Csv("url,pageviews".into())),
                "http_timeout" => raw.http_timeout = Some("soon".into()),
                "metric_limit" => raw.metric_limit = Some("lots".into()),
                _ => raw.url = Some("ftp://a.example".into()),
            }

            let err = raw.validate().unwrap_err();
            match err {
                ConfigError::Validation {
                    field: ref f,
                    reason: ref r,
                } => {
                    assert_eq!(f, field);
                    assert!(r.contains(reason), "{field}: {r}");
                }
                other => panic!("expected validation error, got {other}"),
            }
        }
    }

    #[test]
    fn named_file_must_exist() {
        let err = load(Some(Path::new("/no/such/exporter.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
