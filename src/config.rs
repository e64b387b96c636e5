use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::Error;
use crate::schema::ApiVersion;

// ─── Configuration ───────────────────────────────────────────────

/// Response timeouts below this are replaced by [`DEFAULT_RESPONSE_TIMEOUT`].
const MIN_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

pub const SAMPLE_CONFIG: &str = r#"
# Read Angie API advanced status information
[[inputs.angie_api]]
  ## An array of Angie API URIs to gather stats.
  urls = ["http://localhost/status"]
  # Angie API version, default: 1
  # api_version = 1

  # HTTP response timeout (default: 5s)
  response_timeout = "5s"

  ## Optional TLS Config
  # tls_ca = "/etc/telegraf/ca.pem"
  # tls_cert = "/etc/telegraf/cert.pem"
  # tls_key = "/etc/telegraf/key.pem"
  ## Use TLS but skip chain & host verification
  # insecure_skip_verify = false
"#;

/// Keys of the generic telegraf HTTP client block that this input accepts
/// but does not act on. Anything else unknown is a config error.
const IGNORED_HTTP_CLIENT_KEYS: &[&str] = &[
    "timeout",
    "idle_conn_timeout",
    "max_idle_conn",
    "max_idle_conn_per_host",
    "use_system_proxy",
    "http_proxy_url",
    "tls_server_name",
    "tls_min_version",
    "tls_cipher_suites",
    "tls_renegotiation_method",
    "tls_enable",
    "tls_key_pwd",
    "client_id",
    "client_secret",
    "token_url",
    "audience",
    "scopes",
    "cookie_auth_url",
    "cookie_auth_method",
    "cookie_auth_username",
    "cookie_auth_password",
    "cookie_auth_headers",
    "cookie_auth_body",
    "cookie_auth_renewal",
];

/// Options of one plugin instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Status API base URLs, polled concurrently.
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,

    /// Status API generation; decides the schema once for the whole run.
    #[serde(default)]
    pub api_version: ApiVersion,

    #[serde(default, deserialize_with = "opt_duration_from_toml")]
    pub response_timeout: Option<Duration>,

    /// PEM bundle of extra trusted roots
    #[serde(default)]
    pub tls_ca: Option<PathBuf>,

    /// PEM client certificate, used together with `tls_key`
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,

    #[serde(default)]
    pub tls_key: Option<PathBuf>,

    /// Use TLS but skip chain and host verification.
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

fn default_urls() -> Vec<String> {
    vec!["http://localhost/status".into()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            api_version: ApiVersion::default(),
            response_timeout: None,
            tls_ca: None,
            tls_cert: None,
            tls_key: None,
            insecure_skip_verify: false,
        }
    }
}

impl Config {
    /// The per-request timeout the client is built with.
    pub fn effective_response_timeout(&self) -> Duration {
        match self.response_timeout {
            Some(t) if t >= MIN_RESPONSE_TIMEOUT => t,
            _ => DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.tls_cert.is_some() != self.tls_key.is_some() {
            return Err(Error::Config(
                "tls_cert and tls_key must be given together".into(),
            ));
        }
        Ok(())
    }
}

// ─── Shim config file ────────────────────────────────────────────

/// Layout of the shim's config file: `[[inputs.angie_api]]` tables.
#[derive(Debug, Default, Deserialize)]
pub struct ShimConfig {
    #[serde(default)]
    pub inputs: Inputs,
}

#[derive(Debug, Default, Deserialize)]
pub struct Inputs {
    #[serde(default, deserialize_with = "instances_from_toml")]
    pub angie_api: Vec<Config>,
}

/// Strip the ignored HTTP client keys from each table, then decode it
/// strictly.
fn instances_from_toml<'de, D>(deserializer: D) -> Result<Vec<Config>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<toml::Table>::deserialize(deserializer)?
        .into_iter()
        .map(|mut table| {
            for key in IGNORED_HTTP_CLIENT_KEYS {
                if table.remove(*key).is_some() {
                    debug!(key = *key, "ignoring unsupported HTTP client option");
                }
            }
            toml::Value::Table(table)
                .try_into::<Config>()
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

impl ShimConfig {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        Self::parse(&raw)
    }

    /// Configured plugin instances; a file without any yields one
    /// instance with default options.
    pub fn instances(self) -> Vec<Config> {
        if self.inputs.angie_api.is_empty() {
            vec![Config::default()]
        } else {
            self.inputs.angie_api
        }
    }
}

// ─── Durations ───────────────────────────────────────────────────

/// Deserialize an optional duration string such as `"5s"` or `"1m30s"`.
pub fn opt_duration_from_toml<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// Parse a sequence of `<number><unit>` terms (`ns`, `us`, `µs`, `ms`,
/// `s`, `m`, `h`). A bare `0` is accepted.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let s = raw.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".into());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {raw:?}"))?;
        let (num, tail) = rest.split_at(num_end);
        let value: f64 = num
            .parse()
            .map_err(|_| format!("invalid number in duration {raw:?}"))?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let nanos_per_unit: u64 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            other => return Err(format!("unknown unit {other:?} in duration {raw:?}")),
        };

        total += Duration::from_nanos((value * nanos_per_unit as f64).round() as u64);
        rest = next;
    }
    Ok(total)
}
