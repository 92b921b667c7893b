//! Publish build artifacts to an S3-compatible bucket after a build.
//!
//! A [`Publisher`] hooks into the host build's emit phase, picks the assets
//! that are not excluded, skips the ones already in the bucket, gzips the rest
//! and uploads them one by one with bounded retry.

pub mod asset;
pub mod config;
pub mod encode;
pub mod error;
pub mod hook;
pub mod metadata;
pub mod prefix;
pub mod publisher;
pub mod s3;
pub mod upload;

pub use asset::{Asset, AssetCollection};
pub use config::{AuthConfig, GzipSetting, PublishConfig, PublishOverrides, UploadOptions};
pub use error::{ConfigError, PublishError};
pub use hook::{Compilation, Compiler, EmitHandler, EmitRegistrar};
pub use publisher::{AssetOutcome, PublishReport, Publisher};
pub use s3::{ObjectStore, ObjectSummary, S3Store};
