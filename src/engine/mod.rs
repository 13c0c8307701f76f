//! Transform engines: the boundary where parameters become pixels or URLs.
//!
//! The planner only computes [`TransformParams`]; a [`TransformEngine`] turns
//! them into something a browser can fetch:
//!
//! | Engine | `url` | `render` |
//! |---|---|---|
//! | [`UrlEngine`] | signed query URL for an on-the-fly image server | unsupported |
//! | [`RenderEngine`] | renders into a content-addressed directory, returns its public URL | rendered bytes |
//!
//! Both are deterministic for identical `(asset id, params)` pairs, which is
//! what lets caches upstream of the planner work.

mod geometry;
mod render;
mod url;

pub use render::RenderEngine;
pub use url::UrlEngine;

use crate::asset::Asset;
use crate::params::TransformParams;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("{engine} engine cannot {operation}")]
    Unsupported {
        engine: &'static str,
        operation: &'static str,
    },
    #[error("Transform failed: {0}")]
    Failed(String),
}

/// Encoded bytes of a rendered variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl RenderedImage {
    /// `data:<mime>;base64,<bytes>`
    pub fn to_data_url(&self) -> String {
        data_url(&self.mime_type, &self.bytes)
    }
}

/// Build a base64 data URL.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime_type};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Turns transform parameters into a fetchable URL or rendered bytes.
pub trait TransformEngine: Send + Sync {
    /// URL of the variant described by `params`.
    fn url(&self, asset: &Asset, params: &TransformParams) -> Result<String, TransformError>;

    /// Encoded bytes of the variant described by `params`.
    fn render(
        &self,
        asset: &Asset,
        params: &TransformParams,
    ) -> Result<RenderedImage, TransformError>;
}

/// SHA-256 of an asset identity plus its transform parameters, as hex.
///
/// Identical inputs always produce the same fingerprint; any parameter change
/// produces a different one.
pub fn fingerprint(asset: &Asset, params: &TransformParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"transform\0");
    hasher.update(asset.id.as_bytes());
    hasher.update(b"\0");
    hasher.update(params.to_query_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
