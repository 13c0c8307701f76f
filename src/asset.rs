//! Source assets and how references to them are resolved.
//!
//! An [`Asset`] is read-only input: natural dimensions, byte size, extension
//! and focus point. The planner never touches the file behind it; only the
//! render engine and [`Asset::probe`] do.
//!
//! References (ids, URLs, paths) are resolved through the [`AssetSource`]
//! trait. [`AssetCatalog`] is the in-memory implementation, loadable from a
//! JSON catalog:
//!
//! ```json
//! [
//!   {
//!     "id": "photos::dawn.jpg",
//!     "url": "/assets/photos/dawn.jpg",
//!     "path": "photos/dawn.jpg",
//!     "width": 2400,
//!     "height": 1800,
//!     "size": 3072000,
//!     "extension": "jpg",
//!     "focus": "29-71-3.6"
//!   }
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not read image dimensions of {path}: {reason}")]
    Probe { path: String, reason: String },
    #[error("Invalid focus point '{0}'")]
    InvalidFocus(String),
}

/// Crop focus as percentages of width and height, with an optional zoom.
///
/// Serialized the way asset metadata stores it: `x-y` or `x-y-zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FocusPoint {
    pub x: f64,
    pub y: f64,
    pub zoom: Option<f64>,
}

impl FocusPoint {
    pub fn center() -> Self {
        Self {
            x: 50.0,
            y: 50.0,
            zoom: None,
        }
    }
}

impl Default for FocusPoint {
    fn default() -> Self {
        Self::center()
    }
}

impl fmt::Display for FocusPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.x, self.y)?;
        if let Some(zoom) = self.zoom {
            write!(f, "-{zoom}")?;
        }
        Ok(())
    }
}

impl FromStr for FocusPoint {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AssetError::InvalidFocus(s.to_string());
        let parts: Vec<f64> = s
            .trim()
            .split('-')
            .map(|part| part.parse::<f64>().map_err(|_| invalid()))
            .collect::<Result<_, _>>()?;
        match parts.as_slice() {
            [x, y] => Ok(Self {
                x: *x,
                y: *y,
                zoom: None,
            }),
            [x, y, zoom] => Ok(Self {
                x: *x,
                y: *y,
                zoom: Some(*zoom),
            }),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for FocusPoint {
    type Error = AssetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FocusPoint> for String {
    fn from(focus: FocusPoint) -> Self {
        focus.to_string()
    }
}

/// A source image as known to the host system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Stable identity. Memo and cache keys are derived from it.
    pub id: String,
    /// Public URL of the original file.
    pub url: String,
    /// Path relative to the source root, when the asset lives on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub width: u32,
    pub height: u32,
    /// File size in bytes.
    pub size: u64,
    /// Lowercase file extension without the dot.
    pub extension: String,
    #[serde(default)]
    pub focus: FocusPoint,
}

impl Asset {
    /// Build an asset from a file on disk.
    ///
    /// Dimensions come from the image header, the size from file metadata.
    /// `relative` is used as id, path and URL.
    pub fn probe(source_root: &Path, relative: &str) -> Result<Self, AssetError> {
        let relative = relative.trim_start_matches('/');
        if escapes_root(relative) {
            return Err(AssetError::NotFound(relative.to_string()));
        }
        let file = source_root.join(relative);
        let (width, height) =
            image::image_dimensions(&file).map_err(|e| AssetError::Probe {
                path: file.display().to_string(),
                reason: e.to_string(),
            })?;
        let size = std::fs::metadata(&file)?.len();
        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        Ok(Self {
            id: relative.to_string(),
            url: format!("/{relative}"),
            path: Some(relative.to_string()),
            width,
            height,
            size,
            extension,
            focus: FocusPoint::center(),
        })
    }

    /// Where transform engines should read the original from.
    pub fn location(&self) -> &str {
        self.path
            .as_deref()
            .unwrap_or(&self.url)
            .trim_start_matches('/')
    }

    /// MIME type of the original file.
    pub fn mime_type(&self) -> &'static str {
        mime_for_extension(&self.extension)
    }

    /// Natural width / height ratio, `None` for degenerate assets.
    pub fn natural_ratio(&self) -> Option<f64> {
        (self.width > 0 && self.height > 0).then(|| self.width as f64 / self.height as f64)
    }

    /// SVG and GIF are served as-is instead of through responsive sources.
    pub fn is_passthrough(&self) -> bool {
        matches!(self.extension.as_str(), "svg" | "gif")
    }
}

/// MIME type for a file extension or output format name.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Resolves asset references (ids, URLs, paths) to assets.
pub trait AssetSource: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<Asset, AssetError>;
}

/// In-memory asset lookup by id, URL and path.
#[derive(Debug, Default)]
pub struct AssetCatalog {
    assets: Vec<Asset>,
    /// Normalized reference → index into `assets`.
    index: HashMap<String, usize>,
}

impl AssetCatalog {
    pub fn new(assets: Vec<Asset>) -> Self {
        let mut index = HashMap::new();
        for (i, asset) in assets.iter().enumerate() {
            for reference in [Some(&asset.id), Some(&asset.url), asset.path.as_ref()]
                .into_iter()
                .flatten()
            {
                index.entry(normalize_reference(reference)).or_insert(i);
            }
        }
        Self { assets, index }
    }

    /// Load a JSON catalog file (an array of assets).
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let content = std::fs::read_to_string(path)?;
        let assets: Vec<Asset> = serde_json::from_str(&content)?;
        Ok(Self::new(assets))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetSource for AssetCatalog {
    fn resolve(&self, reference: &str) -> Result<Asset, AssetError> {
        self.index
            .get(&normalize_reference(reference))
            .map(|&i| self.assets[i].clone())
            .ok_or_else(|| AssetError::NotFound(reference.to_string()))
    }
}

/// Resolves references as paths under a source root, probing each file.
#[derive(Debug, Clone)]
pub struct DiskAssets {
    root: PathBuf,
}

impl DiskAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DiskAssets {
    fn resolve(&self, reference: &str) -> Result<Asset, AssetError> {
        let relative = normalize_reference(reference);
        if relative.is_empty() || escapes_root(&relative) || !self.root.join(&relative).is_file() {
            return Err(AssetError::NotFound(reference.to_string()));
        }
        Asset::probe(&self.root, &relative)
    }
}

fn normalize_reference(reference: &str) -> String {
    reference.trim().trim_start_matches('/').to_string()
}

/// True when a relative path could leave the directory it is joined to.
fn escapes_root(relative: &str) -> bool {
    Path::new(relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Asset stub with the given natural size and byte size.
    pub fn stub_asset(width: u32, height: u32, size: u64) -> Asset {
        Asset {
            id: "main::test.jpg".to_string(),
            url: "/assets/test.jpg".to_string(),
            path: Some("test.jpg".to_string()),
            width,
            height,
            size,
            extension: "jpg".to_string(),
            focus: FocusPoint::center(),
        }
    }

    // =========================================================================
    // FocusPoint
    // =========================================================================

    #[test]
    fn focus_parses_two_parts() {
        let focus: FocusPoint = "29-71".parse().unwrap();
        assert_eq!(focus.x, 29.0);
        assert_eq!(focus.y, 71.0);
        assert_eq!(focus.zoom, None);
    }

    #[test]
    fn focus_parses_zoom() {
        let focus: FocusPoint = "29-71-3.6".parse().unwrap();
        assert_eq!(focus.zoom, Some(3.6));
        assert_eq!(focus.to_string(), "29-71-3.6");
    }

    #[test]
    fn focus_default_is_center() {
        assert_eq!(FocusPoint::default().to_string(), "50-50");
    }

    #[test]
    fn focus_rejects_garbage() {
        assert!("left".parse::<FocusPoint>().is_err());
        assert!("1-2-3-4".parse::<FocusPoint>().is_err());
    }

    #[test]
    fn asset_deserializes_focus_string() {
        let asset: Asset = serde_json::from_str(
            r#"{"id": "a", "url": "/a.jpg", "width": 10, "height": 5,
                "size": 100, "extension": "jpg", "focus": "10-20"}"#,
        )
        .unwrap();
        assert_eq!(asset.focus.x, 10.0);
        assert_eq!(asset.path, None);
        assert_eq!(asset.location(), "a.jpg");
    }

    #[test]
    fn asset_focus_defaults_when_missing() {
        let asset: Asset = serde_json::from_str(
            r#"{"id": "a", "url": "/a.jpg", "width": 10, "height": 5,
                "size": 100, "extension": "jpg"}"#,
        )
        .unwrap();
        assert_eq!(asset.focus, FocusPoint::center());
    }

    // =========================================================================
    // Asset helpers
    // =========================================================================

    #[test]
    fn natural_ratio_of_degenerate_asset_is_none() {
        assert_eq!(stub_asset(300, 200, 1).natural_ratio(), Some(1.5));
        assert_eq!(stub_asset(300, 0, 1).natural_ratio(), None);
    }

    #[test]
    fn mime_types() {
        assert_eq!(mime_for_extension("JPG"), "image/jpeg");
        assert_eq!(mime_for_extension("avif"), "image/avif");
        assert_eq!(mime_for_extension("xyz"), "application/octet-stream");
    }

    #[test]
    fn svg_and_gif_are_passthrough() {
        let mut asset = stub_asset(10, 10, 10);
        assert!(!asset.is_passthrough());
        asset.extension = "svg".into();
        assert!(asset.is_passthrough());
    }

    #[test]
    fn probe_reads_dimensions_and_size() {
        let tmp = TempDir::new().unwrap();
        let img = image::RgbImage::from_pixel(12, 8, image::Rgb([200, 10, 10]));
        img.save(tmp.path().join("red.png")).unwrap();

        let asset = Asset::probe(tmp.path(), "/red.png").unwrap();
        assert_eq!((asset.width, asset.height), (12, 8));
        assert_eq!(asset.extension, "png");
        assert_eq!(asset.id, "red.png");
        assert_eq!(asset.url, "/red.png");
        assert!(asset.size > 0);
    }

    #[test]
    fn relative_paths_stay_under_source_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        std::fs::create_dir(&root).unwrap();
        image::RgbImage::new(2, 2)
            .save(tmp.path().join("secret.png"))
            .unwrap();

        assert!(matches!(
            Asset::probe(&root, "../secret.png"),
            Err(AssetError::NotFound(_))
        ));
        assert!(matches!(
            Asset::probe(&root, "/img/../../secret.png"),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn probe_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(Asset::probe(tmp.path(), "nope.png").is_err());
    }

    // =========================================================================
    // AssetCatalog
    // =========================================================================

    #[test]
    fn catalog_resolves_by_id_url_and_path() {
        let catalog = AssetCatalog::new(vec![stub_asset(300, 200, 1000)]);
        assert!(catalog.resolve("main::test.jpg").is_ok());
        assert!(catalog.resolve("/assets/test.jpg").is_ok());
        assert!(catalog.resolve("assets/test.jpg").is_ok());
        assert!(catalog.resolve("/test.jpg").is_ok());
    }

    #[test]
    fn catalog_miss_is_not_found() {
        let catalog = AssetCatalog::new(vec![]);
        assert!(catalog.is_empty());
        assert!(matches!(
            catalog.resolve("missing.jpg"),
            Err(AssetError::NotFound(r)) if r == "missing.jpg"
        ));
    }

    #[test]
    fn catalog_loads_json_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("assets.json");
        std::fs::write(
            &path,
            r#"[{"id": "x", "url": "/x.png", "width": 4, "height": 3,
                 "size": 9, "extension": "png"}]"#,
        )
        .unwrap();

        let catalog = AssetCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.resolve("x").unwrap().width, 4);
    }

    // =========================================================================
    // DiskAssets
    // =========================================================================

    #[test]
    fn disk_assets_probe_files() {
        let tmp = TempDir::new().unwrap();
        image::RgbImage::new(6, 4)
            .save(tmp.path().join("a.png"))
            .unwrap();

        let assets = DiskAssets::new(tmp.path());
        assert_eq!(assets.resolve("/a.png").unwrap().width, 6);
        assert!(matches!(
            assets.resolve("b.png"),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn disk_assets_reject_parent_references() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public");
        std::fs::create_dir(&root).unwrap();
        image::RgbImage::new(6, 4)
            .save(tmp.path().join("outside.png"))
            .unwrap();
        assert!(tmp.path().join("public/../outside.png").is_file());

        let assets = DiskAssets::new(&root);
        assert!(matches!(
            assets.resolve("../outside.png"),
            Err(AssetError::NotFound(r)) if r == "../outside.png"
        ));
        assert!(matches!(
            assets.resolve("/../outside.png"),
            Err(AssetError::NotFound(_))
        ));
    }
}
