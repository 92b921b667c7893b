use bytes::Bytes;
use regex::Regex;
use std::path::PathBuf;

/// A single named build output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub local_path: Option<PathBuf>,
    pub content: Bytes,
}

impl Asset {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            local_path: None,
            content: content.into(),
        }
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }
}

/// The build's output collection, keyed by asset name, in insertion order
#[derive(Debug, Clone, Default)]
pub struct AssetCollection {
    assets: Vec<Asset>,
}

impl AssetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an asset, replacing one with the same name in place
    pub fn insert(&mut self, asset: Asset) {
        match self.assets.iter_mut().find(|a| a.name == asset.name) {
            Some(existing) => *existing = asset,
            None => self.assets.push(asset),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Asset> {
        let idx = self.assets.iter().position(|a| a.name == name)?;
        Some(self.assets.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl FromIterator<Asset> for AssetCollection {
    fn from_iter<I: IntoIterator<Item = Asset>>(iter: I) -> Self {
        let mut collection = Self::new();
        for asset in iter {
            collection.insert(asset);
        }
        collection
    }
}

/// Assets to publish: every asset whose name does not match `exclude`, in
/// collection order
pub fn select(assets: &AssetCollection, exclude: &Regex) -> Vec<Asset> {
    assets
        .iter()
        .filter(|asset| !exclude.is_match(&asset.name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(names: &[&str]) -> AssetCollection {
        names.iter().map(|n| Asset::new(*n, n.as_bytes().to_vec())).collect()
    }

    #[test]
    fn test_select_filters_excluded_and_keeps_order() {
        let assets = collection(&["index.html", "main.js", "about.html", "style.css", "vendor.js"]);
        let exclude = Regex::new(r".*\.html$").unwrap();

        let names: Vec<_> = select(&assets, &exclude)
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["main.js", "style.css", "vendor.js"]);
    }

    #[test]
    fn test_select_is_unanchored_search() {
        let assets = collection(&["js/app.js.map", "js/app.js"]);
        let exclude = Regex::new(r"\.map").unwrap();

        let selected = select(&assets, &exclude);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "js/app.js");
    }

    #[test]
    fn test_collection_insert_replaces_and_remove() {
        let mut assets = collection(&["a.js", "b.js"]);
        assets.insert(Asset::new("a.js", "new"));

        assert_eq!(assets.len(), 2);
        assert_eq!(assets.get("a.js").unwrap().content, Bytes::from("new"));
        assert_eq!(assets.iter().next().unwrap().name, "a.js");

        assert!(assets.remove("a.js").is_some());
        assert!(assets.remove("a.js").is_none());
        assert!(!assets.contains("a.js"));
        assert_eq!(assets.len(), 1);
    }
}
