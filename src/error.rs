use thiserror::Error;

/// Errors raised while resolving configuration or connecting to the store
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Exclude pattern does not compile
    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidExclude {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Bucket name rejected before any request is made
    #[error("Invalid bucket '{bucket}': {reason}")]
    InvalidBucket { bucket: String, reason: String },

    /// Region rejected before any request is made
    #[error("Invalid region '{region}': {reason}")]
    InvalidRegion { region: String, reason: String },

    /// Config file could not be read or parsed
    #[error("Failed to load config file {path}: {message}")]
    File { path: String, message: String },
}

/// Terminal failures of the publish pipeline
#[derive(Error, Debug)]
pub enum PublishError {
    /// Compression failed. Deterministic, so never retried
    #[error("Failed to encode {name}: {message}")]
    Encoding { name: String, message: String },

    /// Every upload attempt failed
    #[error("Upload of {key} failed after {attempts} attempt(s): {source:#}")]
    Upload {
        key: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl PublishError {
    /// Short machine-friendly name of the error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::Encoding { .. } => "EncodingError",
            Self::Upload { .. } => "UploadError",
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::Upload { key, source, .. } => {
                let detail = format!("{:#}", source);
                let lower = detail.to_lowercase();
                if lower.contains("access denied") || lower.contains("forbidden") {
                    format!(
                        "Access denied uploading {}: {}\n\nPossible solutions:\n  \
                         1. Check ACCESS_KEY_ID / ACCESS_KEY_SECRET\n  \
                         2. Verify the credentials may write to the bucket",
                        key, detail
                    )
                } else if lower.contains("nosuchbucket") || lower.contains("dispatch") {
                    format!(
                        "Could not reach the bucket for {}: {}\n\nPossible solutions:\n  \
                         1. Check BUCKET and REGION\n  \
                         2. Set ENDPOINT when publishing to a non-AWS store",
                        key, detail
                    )
                } else {
                    self.to_string()
                }
            }
            Self::Encoding { name, message } => {
                format!(
                    "Could not compress {}: {}\n\nPossible solutions:\n  \
                     1. Use a gzip level between 0 and 9\n  \
                     2. Disable compression with use_gzip: false",
                    name, message
                )
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;
