use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source of the project name used when no explicit one is configured
pub trait ProjectMetadata: Send + Sync {
    /// The project name, or `None` when it cannot be discovered
    fn project_name(&self) -> Option<String>;
}

/// Reads the project name from a manifest in a directory:
/// `package.json` first, then `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct ManifestMetadata {
    root: PathBuf,
}

#[derive(Deserialize)]
struct PackageJson {
    name: Option<String>,
}

#[derive(Deserialize)]
struct CargoManifest {
    package: Option<CargoPackage>,
}

#[derive(Deserialize)]
struct CargoPackage {
    name: Option<String>,
}

impl ManifestMetadata {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Look in the process working directory
    pub fn current_dir() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    fn from_package_json(path: &Path) -> Option<String> {
        let raw = std::fs::read_to_string(path).ok()?;
        let pkg: PackageJson = serde_json::from_str(&raw)
            .map_err(|e| debug!("Ignoring unreadable {}: {}", path.display(), e))
            .ok()?;
        pkg.name
    }

    fn from_cargo_toml(path: &Path) -> Option<String> {
        let raw = std::fs::read_to_string(path).ok()?;
        let manifest: CargoManifest = toml::from_str(&raw)
            .map_err(|e| debug!("Ignoring unreadable {}: {}", path.display(), e))
            .ok()?;
        manifest.package?.name
    }
}

impl ProjectMetadata for ManifestMetadata {
    fn project_name(&self) -> Option<String> {
        Self::from_package_json(&self.root.join("package.json"))
            .or_else(|| Self::from_cargo_toml(&self.root.join("Cargo.toml")))
            .filter(|name| !name.is_empty())
    }
}
