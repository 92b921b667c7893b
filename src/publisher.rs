use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use indicatif::ProgressBar;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::asset::{Asset, AssetCollection, select};
use crate::config::PublishConfig;
use crate::encode::encode;
use crate::error::Result;
use crate::hook::{Compilation, Compiler, EmitHandler, registrar};
use crate::metadata::{ManifestMetadata, ProjectMetadata};
use crate::prefix::PrefixCalculator;
use crate::s3::{ObjectStore, find_existing};
use crate::upload::{RetryPolicy, upload_with_retry};

pub const PLUGIN_NAME: &str = "artifact-publish";

/// Progress messages go to `info` only when logging is enabled
macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// What happened to one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    Uploaded {
        name: String,
        key: String,
        attempts: u32,
        bytes: usize,
    },
    Skipped {
        name: String,
        key: String,
        last_modified: Option<DateTime<Utc>>,
    },
}

/// Result of a successful publish run, outcomes in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub outcomes: Vec<AssetOutcome>,
}

impl PublishReport {
    pub fn uploaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, AssetOutcome::Uploaded { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, AssetOutcome::Skipped { .. }))
            .count()
    }

    pub fn bytes_uploaded(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                AssetOutcome::Uploaded { bytes, .. } => *bytes,
                AssetOutcome::Skipped { .. } => 0,
            })
            .sum()
    }
}

/// Publishes a build's assets to an object store
pub struct Publisher {
    config: Arc<PublishConfig>,
    store: Arc<dyn ObjectStore>,
    prefix: PrefixCalculator,
    progress: Option<ProgressBar>,
}

impl Publisher {
    /// Publisher that discovers the project name from the working directory
    pub fn new(config: PublishConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self::with_metadata(config, store, Box::new(ManifestMetadata::current_dir()))
    }

    pub fn with_metadata(
        config: PublishConfig,
        store: Arc<dyn ObjectStore>,
        metadata: Box<dyn ProjectMetadata>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            prefix: PrefixCalculator::new(Arc::clone(&config), metadata),
            config,
            store,
            progress: None,
        }
    }

    /// Advance `pb` once per processed asset
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub fn prefix(&self) -> &str {
        self.prefix.prefix()
    }

    /// Register this publisher on the host's emit phase
    pub fn apply(self: Arc<Self>, compiler: &mut Compiler) {
        registrar(compiler).register_emit(PLUGIN_NAME, self);
    }

    /// Assets of `assets` that should be published
    pub fn select(&self, assets: &AssetCollection) -> Vec<Asset> {
        select(assets, &self.config.exclude)
    }

    /// Publish `candidates` one after another
    ///
    /// Published (or already present) assets are removed from `assets` in
    /// remove mode. The first terminal failure stops the run; assets after it
    /// are left untouched.
    pub async fn publish(
        &self,
        candidates: &[Asset],
        assets: &mut AssetCollection,
    ) -> Result<PublishReport> {
        let verbose = self.config.enable_log;
        let total = candidates.len();
        let policy = RetryPolicy::new(self.config.retry, self.config.retry_delay);
        let mut report = PublishReport::default();

        if let Some(pb) = &self.progress {
            pb.set_length(total as u64);
        }

        for (idx, asset) in candidates.iter().enumerate() {
            let current = idx + 1;
            let key = self.prefix.remote_key(&asset.name);

            if let Some(pb) = &self.progress {
                pb.set_message(key.clone());
            }

            let existing = if self.config.exist_check {
                find_existing(self.store.as_ref(), &key).await
            } else {
                None
            };

            let outcome = match existing {
                Some(found) => {
                    let uploaded_at = found
                        .last_modified
                        .map(format_time)
                        .unwrap_or_else(|| "unknown".to_string());
                    progress!(
                        verbose,
                        "Already exists, skipped upload (Uploaded at {}) {}/{}: {}",
                        uploaded_at,
                        current,
                        total,
                        key
                    );
                    AssetOutcome::Skipped {
                        name: asset.name.clone(),
                        key,
                        last_modified: found.last_modified,
                    }
                }
                None => {
                    let encoded = encode(asset, self.config.use_gzip, &self.config.options)?;
                    let bytes = encoded.body.len();

                    progress!(verbose, "Uploading {}/{}: {}", current, total, key);
                    let attempts = upload_with_retry(
                        self.store.as_ref(),
                        &key,
                        encoded.body,
                        &encoded.options,
                        policy,
                        verbose,
                    )
                    .await?;
                    progress!(verbose, "Upload successful {}/{}: {}", current, total, key);

                    AssetOutcome::Uploaded {
                        name: asset.name.clone(),
                        key,
                        attempts,
                        bytes,
                    }
                }
            };

            if self.config.remove_mode {
                assets.remove(&asset.name);
            }
            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    /// Select, publish and report into `compilation`
    ///
    /// Failures are logged; unless errors are ignored they are also pushed
    /// into the compilation's error list for the host to act on.
    pub async fn run(&self, compilation: &mut Compilation) -> Option<PublishReport> {
        let verbose = self.config.enable_log;
        let candidates = self.select(&compilation.assets);

        progress!(verbose, "OSS Upload started...");
        match self.publish(&candidates, &mut compilation.assets).await {
            Ok(report) => {
                progress!(
                    verbose,
                    "OSS Upload completed: {} uploaded ({} bytes), {} skipped",
                    report.uploaded(),
                    report.bytes_uploaded(),
                    report.skipped()
                );
                Some(report)
            }
            Err(e) => {
                error!("OSS Upload error::: {}: {}", e.code(), e);
                if !self.config.ignore_errors {
                    compilation.errors.push(e.into());
                }
                None
            }
        }
    }
}

#[async_trait]
impl EmitHandler for Publisher {
    async fn on_emit(&self, compilation: &mut Compilation) {
        self.run(compilation).await;
    }
}

/// `YYYY-M-D H:M` in local time
fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%-m-%-d %-H:%-M")
        .to_string()
}
