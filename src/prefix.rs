use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::config::PublishConfig;
use crate::metadata::ProjectMetadata;

/// Computes the remote directory every asset of a run is published under
///
/// The value is computed on first use and reused for the lifetime of the
/// calculator.
pub struct PrefixCalculator {
    config: Arc<PublishConfig>,
    metadata: Box<dyn ProjectMetadata>,
    prefix: OnceLock<String>,
}

impl PrefixCalculator {
    pub fn new(config: Arc<PublishConfig>, metadata: Box<dyn ProjectMetadata>) -> Self {
        Self {
            config,
            metadata,
            prefix: OnceLock::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        self.prefix.get_or_init(|| {
            let prefix = self.compute();
            debug!("Using OSS directory: {}", prefix);
            prefix
        })
    }

    fn compute(&self) -> String {
        // an explicit prefix ignores base dir and project name
        if !self.config.prefix.is_empty() {
            return self.config.prefix.clone();
        }

        let project_name = if self.config.project_name.is_empty() {
            self.metadata.project_name().unwrap_or_default()
        } else {
            self.config.project_name.clone()
        };

        if project_name.is_empty() {
            warn!(
                "Using default upload directory: {}",
                self.config.oss_base_dir
            );
            self.config.oss_base_dir.clone()
        } else {
            format!("{}/{}", self.config.oss_base_dir, project_name)
        }
    }

    /// Remote key of an asset: `prefix/name` with a doubled separator
    /// collapsed
    pub fn remote_key(&self, name: &str) -> String {
        join_key(self.prefix(), name)
    }
}

pub fn join_key(prefix: &str, name: &str) -> String {
    format!("{}/{}", prefix, name).replacen("//", "/", 1)
}
