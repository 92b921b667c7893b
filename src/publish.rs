use anyhow::{Context, Result};
use artifact_publish::s3::helpers::parse_headers;
use artifact_publish::{
    Asset, AssetCollection, Compilation, Compiler, ConfigError, GzipSetting, PublishConfig,
    PublishError, PublishOverrides, Publisher, S3Store, UploadOptions,
};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "artifact-publish",
    version = env!("CARGO_PKG_VERSION"),
    about = "Publish build output to an S3-compatible bucket",
    long_about = "Runs as the emit step of a build: every file in the output directory that is not excluded \
                  is gzipped and uploaded under a common prefix. Files already present in the bucket are skipped. \
                  In remove mode (the default) published files are deleted from the local output.",
    after_help = "Examples:\n  \
                  artifact-publish ./dist                         # Publish with .env settings\n  \
                  artifact-publish ./dist --prefix cdn/shop/1.2.0 # Explicit remote prefix\n  \
                  artifact-publish ./dist --no-gzip --keep-local  # Raw upload, keep files\n  \
                  artifact-publish ./dist -c publish.yaml         # Settings from a YAML file\n\n\
                  Configuration (.env):\n  \
                  ACCESS_KEY_ID=...\n  \
                  ACCESS_KEY_SECRET=...\n  \
                  BUCKET=my-bucket\n  \
                  REGION=oss-cn-hangzhou\n  \
                  ENDPOINT=https://oss-cn-hangzhou.aliyuncs.com"
)]
struct Cli {
    /// Build output directory
    dir: PathBuf,

    /// YAML file with publish settings
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Prefix of the environment variables to read
    #[arg(long)]
    env_prefix: Option<String>,

    /// Remote prefix (overrides base dir and project name)
    #[arg(long)]
    prefix: Option<String>,

    /// Project name appended to the base dir
    #[arg(long)]
    project_name: Option<String>,

    /// Remote base directory
    #[arg(long)]
    base_dir: Option<String>,

    /// Regex of asset names to leave out
    #[arg(long)]
    exclude: Option<String>,

    /// Retries after a failed upload
    #[arg(long, allow_negative_numbers = true)]
    retry: Option<i64>,

    /// Pause between retries in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Upload even if the object already exists
    #[arg(long)]
    no_exist_check: bool,

    /// Gzip level (0-9)
    #[arg(long, conflicts_with = "no_gzip")]
    gzip_level: Option<u32>,

    /// Upload content uncompressed
    #[arg(long)]
    no_gzip: bool,

    /// Extra upload headers (Name=value pairs, comma-separated)
    #[arg(long)]
    headers: Option<String>,

    /// Keep published files in the output directory
    #[arg(long)]
    keep_local: bool,

    /// Do not fail when publishing fails
    #[arg(long)]
    ignore_errors: bool,

    /// Log every upload step
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Register through the legacy plugin callback
    #[arg(long, hide = true)]
    legacy_hook: bool,
}

impl Cli {
    fn overrides(&self) -> PublishOverrides {
        let flag = |set: bool| set.then_some(true);

        PublishOverrides {
            env_prefix: self.env_prefix.clone(),
            prefix: self.prefix.clone(),
            project_name: self.project_name.clone(),
            oss_base_dir: self.base_dir.clone(),
            exclude: self.exclude.clone(),
            retry: self.retry,
            retry_delay_ms: self.retry_delay_ms,
            exist_check: self.no_exist_check.then_some(false),
            use_gzip: if self.no_gzip {
                Some(GzipSetting::Disabled)
            } else {
                self.gzip_level.map(GzipSetting::Level)
            },
            options: self.headers.as_deref().map(|h| UploadOptions {
                headers: parse_headers(h),
            }),
            remove_mode: self.keep_local.then_some(false),
            ignore_errors: flag(self.ignore_errors),
            enable_log: flag(self.verbose),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file early to get LOG_LEVEL
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    info!("Artifact publisher v{}", env!("CARGO_PKG_VERSION"));

    let file_overrides = match &cli.config {
        Some(path) => load_overrides(path)?,
        None => PublishOverrides::default(),
    };
    let config = PublishConfig::resolve(file_overrides.merge(cli.overrides()))?;

    let assets = collect_assets(&cli.dir).await?;
    if assets.is_empty() {
        println!(
            "{}",
            style(format!("No files found in {}", cli.dir.display())).yellow()
        );
        return Ok(());
    }

    let store = S3Store::connect(&config.auth).await?;
    println!(
        "{}",
        style(format!("📦 Target: s3://{}", store.bucket()))
            .cyan()
            .bold()
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let publisher = Arc::new(Publisher::new(config, Arc::new(store)).with_progress(pb.clone()));
    println!(
        "{}",
        style(format!("⚡ Publishing under {}/", publisher.prefix())).cyan()
    );

    let remove_mode = publisher.config().remove_mode;

    let mut compiler = if cli.legacy_hook {
        Compiler::legacy()
    } else {
        Compiler::new()
    };
    Arc::clone(&publisher).apply(&mut compiler);

    let mut compilation = Compilation::new(assets.clone());
    compiler.emit(&mut compilation).await?;
    pb.finish_and_clear();

    let removed: Vec<&Asset> = assets
        .iter()
        .filter(|a| !compilation.assets.contains(&a.name))
        .collect();

    if remove_mode {
        for asset in &removed {
            remove_local(asset).await;
        }
    }

    print_summary(&assets, &removed, &compilation, remove_mode);

    if !compilation.errors.is_empty() {
        for err in &compilation.errors {
            let message = match err.downcast_ref::<PublishError>() {
                Some(e) => e.user_message(),
                None => format!("{:#}", err),
            };
            eprintln!("{} {}", style("✗").red(), style(message).red());
        }
        anyhow::bail!("Publishing failed");
    }

    Ok(())
}

fn load_overrides(path: &Path) -> Result<PublishOverrides, ConfigError> {
    let file_error = |message: String| ConfigError::File {
        path: path.display().to_string(),
        message,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
    serde_yaml::from_str(&raw).map_err(|e| file_error(e.to_string()))
}

/// Load every file under `dir` as an asset named by its `/`-separated
/// relative path
async fn collect_assets(dir: &Path) -> Result<AssetCollection> {
    if !dir.is_dir() {
        anyhow::bail!("Build output directory does not exist: {}", dir.display());
    }

    let mut assets = AssetCollection::new();
    let mut entries: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    entries.sort();

    for path in entries {
        let name = asset_name(dir, &path)?;
        let content = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        assets.insert(Asset::new(name, content).with_local_path(path));
    }

    Ok(assets)
}

fn asset_name(dir: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(dir)
        .context("Failed to strip prefix")?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

async fn remove_local(asset: &Asset) {
    if let Some(path) = &asset.local_path {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn print_summary(
    assets: &AssetCollection,
    removed: &[&Asset],
    compilation: &Compilation,
    remove_mode: bool,
) {
    let published_bytes: u64 = removed.iter().map(|a| a.content.len() as u64).sum();

    println!("\n{}", style("═".repeat(70)).dim());
    if remove_mode {
        println!(
            "{}",
            style(format!(
                "Summary: {} published, {} kept locally, {} error(s)",
                removed.len(),
                assets.len() - removed.len(),
                compilation.errors.len()
            ))
            .bold()
        );
        if published_bytes > 0 {
            println!(
                "{}",
                style(format!(
                    "Published: {} ({} bytes before compression)",
                    format_size(published_bytes),
                    published_bytes
                ))
                .dim()
            );
        }
    } else {
        println!(
            "{}",
            style(format!(
                "Summary: {} file(s) processed, {} error(s)",
                assets.len(),
                compilation.errors.len()
            ))
            .bold()
        );
    }
}

/// Format file size for display
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
