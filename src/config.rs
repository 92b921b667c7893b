use regex::Regex;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const DEFAULT_RETRY: i64 = 3;
pub const DEFAULT_BASE_DIR: &str = "auto_upload_ci";
pub const DEFAULT_EXCLUDE: &str = r".*\.html$";

/// Credentials and location of the target bucket
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (OSS, MinIO, ...)
    pub endpoint: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &redact(&self.access_key_secret))
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "***" }
}

impl AuthConfig {
    /// Validate bucket and region before any request is made
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_region(&self.region)?;
        validate_bucket_name(&self.bucket)
    }
}

fn validate_region(region: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidRegion {
        region: region.to_string(),
        reason: reason.to_string(),
    };

    if region.is_empty() {
        return Err(invalid("region cannot be empty"));
    }

    // us-west-2, oss-cn-hangzhou, ...
    if !region.contains('-') {
        return Err(invalid("doesn't look like a valid region"));
    }

    Ok(())
}

fn validate_bucket_name(bucket: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBucket {
        bucket: bucket.to_string(),
        reason,
    };

    if bucket.len() < 3 || bucket.len() > 63 {
        return Err(invalid(format!(
            "must be between 3 and 63 characters (got {})",
            bucket.len()
        )));
    }

    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !edge_ok(bucket.chars().next()) || !edge_ok(bucket.chars().last()) {
        return Err(invalid(
            "must start and end with a lowercase letter or number".to_string(),
        ));
    }

    if let Some(c) = bucket
        .chars()
        .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-' && *c != '.')
    {
        return Err(invalid(format!("contains invalid character '{}'", c)));
    }

    if bucket.contains("..") {
        return Err(invalid("cannot contain consecutive periods".to_string()));
    }

    if bucket.split('.').all(|part| part.parse::<u8>().is_ok()) {
        return Err(invalid("cannot be formatted as an IP address".to_string()));
    }

    Ok(())
}

/// Whether and how hard to gzip uploaded content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawGzip", into = "RawGzip")]
pub enum GzipSetting {
    Disabled,
    Enabled,
    Level(u32),
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum RawGzip {
    Flag(bool),
    Level(u32),
}

impl From<RawGzip> for GzipSetting {
    fn from(raw: RawGzip) -> Self {
        match raw {
            RawGzip::Flag(true) => Self::Enabled,
            RawGzip::Flag(false) => Self::Disabled,
            RawGzip::Level(level) => Self::Level(level),
        }
    }
}

impl From<GzipSetting> for RawGzip {
    fn from(setting: GzipSetting) -> Self {
        match setting {
            GzipSetting::Enabled => Self::Flag(true),
            GzipSetting::Disabled => Self::Flag(false),
            GzipSetting::Level(level) => Self::Level(level),
        }
    }
}

/// Transport options passed along with every put
///
/// Treated as a value: deriving a variant returns a new instance and leaves
/// the original untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl UploadOptions {
    /// Copy of these options with one header set (replacing any
    /// case-insensitive duplicate)
    pub fn with_header(&self, name: &str, value: &str) -> Self {
        let mut headers: BTreeMap<String, String> = self
            .headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        headers.insert(name.to_string(), value.to_string());
        Self { headers }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Fully resolved, immutable publish configuration
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub auth: AuthConfig,
    pub retry: u32,
    pub retry_delay: Duration,
    pub exist_check: bool,
    pub oss_base_dir: String,
    pub project_name: String,
    pub prefix: String,
    pub exclude: Regex,
    pub enable_log: bool,
    pub ignore_errors: bool,
    pub remove_mode: bool,
    pub use_gzip: GzipSetting,
    pub env_prefix: String,
    pub options: UploadOptions,
}

/// Partial credentials; unset fields fall through to lower layers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthOverrides {
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

/// Caller-supplied settings, the highest precedence layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishOverrides {
    pub auth: Option<AuthOverrides>,
    #[serde(deserialize_with = "lenient_retry")]
    pub retry: Option<i64>,
    pub retry_delay_ms: Option<u64>,
    pub exist_check: Option<bool>,
    pub oss_base_dir: Option<String>,
    pub project_name: Option<String>,
    pub prefix: Option<String>,
    pub exclude: Option<String>,
    pub enable_log: Option<bool>,
    pub ignore_errors: Option<bool>,
    pub remove_mode: Option<bool>,
    pub use_gzip: Option<GzipSetting>,
    pub env_prefix: Option<String>,
    pub options: Option<UploadOptions>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRetry {
    Count(i64),
    Other(IgnoredAny),
}

/// Any retry value that is not an integer counts as "no retries"
fn lenient_retry<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawRetry>::deserialize(deserializer)? {
        Some(RawRetry::Count(retry)) => Some(retry),
        Some(RawRetry::Other(_)) => {
            warn!("retry is not an integer, falling back to 0");
            Some(0)
        }
        None => None,
    })
}

impl PublishOverrides {
    /// Layer `other` on top of `self`, field by field
    pub fn merge(self, other: PublishOverrides) -> PublishOverrides {
        let auth = match (self.auth, other.auth) {
            (Some(base), Some(top)) => Some(AuthOverrides {
                access_key_id: top.access_key_id.or(base.access_key_id),
                access_key_secret: top.access_key_secret.or(base.access_key_secret),
                bucket: top.bucket.or(base.bucket),
                region: top.region.or(base.region),
                endpoint: top.endpoint.or(base.endpoint),
            }),
            (base, top) => top.or(base),
        };

        PublishOverrides {
            auth,
            retry: other.retry.or(self.retry),
            retry_delay_ms: other.retry_delay_ms.or(self.retry_delay_ms),
            exist_check: other.exist_check.or(self.exist_check),
            oss_base_dir: other.oss_base_dir.or(self.oss_base_dir),
            project_name: other.project_name.or(self.project_name),
            prefix: other.prefix.or(self.prefix),
            exclude: other.exclude.or(self.exclude),
            enable_log: other.enable_log.or(self.enable_log),
            ignore_errors: other.ignore_errors.or(self.ignore_errors),
            remove_mode: other.remove_mode.or(self.remove_mode),
            use_gzip: other.use_gzip.or(self.use_gzip),
            env_prefix: other.env_prefix.or(self.env_prefix),
            options: other.options.or(self.options),
        }
    }

    /// Read the environment layer. Only variables that are present produce
    /// values; booleans are true only for the literal "true".
    pub fn from_env<F>(env_prefix: &str, lookup: F) -> PublishOverrides
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}{}", env_prefix, suffix));
        let flag = |suffix: &str| var(suffix).map(|v| v == "true");

        let auth = AuthOverrides {
            access_key_id: var("ACCESS_KEY_ID"),
            access_key_secret: var("ACCESS_KEY_SECRET"),
            bucket: var("BUCKET"),
            region: var("REGION"),
            endpoint: var("ENDPOINT"),
        };

        PublishOverrides {
            auth: Some(auth),
            enable_log: flag("ENABLE_LOG"),
            ignore_errors: flag("IGNORE_ERRORS"),
            remove_mode: flag("REMOVE_MODE"),
            oss_base_dir: var("OSS_BASE_DIR"),
            prefix: var("PREFIX"),
            ..Default::default()
        }
    }
}

impl PublishConfig {
    /// Resolve defaults, process environment and `overrides` into one config
    ///
    /// # Errors
    ///
    /// Returns an error if the exclude pattern is not a valid regex
    pub fn resolve(overrides: PublishOverrides) -> Result<Self, ConfigError> {
        Self::resolve_with_env(overrides, |name| std::env::var(name).ok())
    }

    /// Same as [`PublishConfig::resolve`] with an explicit environment lookup
    pub fn resolve_with_env<F>(overrides: PublishOverrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_prefix = overrides.env_prefix.clone().unwrap_or_default();
        let merged = PublishOverrides::from_env(&env_prefix, lookup).merge(overrides);

        let auth = merged.auth.unwrap_or_default();
        let pattern = merged.exclude.unwrap_or_else(|| DEFAULT_EXCLUDE.to_string());
        let exclude = Regex::new(&pattern).map_err(|source| ConfigError::InvalidExclude {
            pattern: pattern.clone(),
            source,
        })?;

        let config = Self {
            auth: AuthConfig {
                access_key_id: auth.access_key_id.unwrap_or_default(),
                access_key_secret: auth.access_key_secret.unwrap_or_default(),
                bucket: auth.bucket.unwrap_or_default(),
                region: auth.region.unwrap_or_default(),
                endpoint: auth.endpoint.filter(|e| !e.is_empty()),
            },
            retry: clamp_retry(merged.retry.unwrap_or(DEFAULT_RETRY)),
            retry_delay: Duration::from_millis(merged.retry_delay_ms.unwrap_or(0)),
            exist_check: merged.exist_check.unwrap_or(true),
            oss_base_dir: merged
                .oss_base_dir
                .unwrap_or_else(|| DEFAULT_BASE_DIR.to_string()),
            project_name: merged.project_name.unwrap_or_default(),
            prefix: merged.prefix.unwrap_or_default(),
            exclude,
            enable_log: merged.enable_log.unwrap_or(false),
            ignore_errors: merged.ignore_errors.unwrap_or(false),
            remove_mode: merged.remove_mode.unwrap_or(true),
            use_gzip: merged.use_gzip.unwrap_or(GzipSetting::Enabled),
            env_prefix,
            options: merged.options.unwrap_or_default(),
        };

        debug!("Final configuration: {:?}", config);
        Ok(config)
    }
}

/// Negative retry counts make no sense; treat them as "no retries"
fn clamp_retry(retry: i64) -> u32 {
    u32::try_from(retry.max(0)).unwrap_or(u32::MAX)
}
