//! Local render engine built on the `image` crate.
//!
//! Every variant is rendered once into a content-addressed directory: the
//! file name is the [`fingerprint`] of the asset and its parameters, so a
//! repeated request finds the file already on disk and skips decoding.
//!
//! ## Parameter mapping
//!
//! | Parameter | Effect |
//! |---|---|
//! | `w` + `h` with `fit=crop-x-y[-zoom]` | fill-resize, then crop around the focus point |
//! | `w` + `h` with `fit=fill` | stretch to exact size |
//! | `w` + `h`, any other fit | fit inside the box, keeping the aspect ratio |
//! | `w` or `h` alone | proportional resize |
//! | `blur` | gaussian blur, value used as sigma |
//! | `fm` | output encoder: `jpg`, `png`, `webp`, `avif` |
//! | `q` | JPEG and AVIF quality |
//!
//! WebP output is lossless (the `image` crate has no lossy WebP encoder) and
//! AVIF sources cannot be decoded; both limits come from the pure-Rust codecs.

use super::geometry::{fill_dimensions, focal_offset, proportional_height, proportional_width};
use super::{RenderedImage, TransformEngine, TransformError, fingerprint};
use crate::asset::{Asset, FocusPoint, mime_for_extension};
use crate::config::Config;
use crate::params::{Scalar, TransformParams};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const DEFAULT_QUALITY: u32 = 90;

/// AVIF encoder speed (1 slowest … 10 fastest).
const AVIF_SPEED: u8 = 6;

#[derive(Debug, Clone)]
pub struct RenderEngine {
    source_root: PathBuf,
    cache_dir: PathBuf,
    url_prefix: String,
    app_url: Option<String>,
}

impl RenderEngine {
    pub fn new(
        source_root: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            cache_dir: cache_dir.into(),
            url_prefix: url_prefix.into(),
            app_url: None,
        }
    }

    /// Engine reading originals from `source_root`, with cache location and
    /// URL prefix taken from the `[transform]` config section.
    pub fn from_config(config: &Config, source_root: &Path) -> Self {
        let transform = &config.transform;
        let cache_dir = PathBuf::from(&transform.cache_dir);
        let cache_dir = if cache_dir.is_absolute() {
            cache_dir
        } else {
            source_root.join(cache_dir)
        };
        Self {
            source_root: source_root.to_path_buf(),
            cache_dir,
            url_prefix: transform.url_prefix.clone(),
            app_url: transform
                .app_url
                .clone()
                .filter(|_| config.force_absolute_urls),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cache file name for a variant: `<fingerprint>.<ext>`.
    pub fn file_name(&self, asset: &Asset, params: &TransformParams) -> String {
        format!(
            "{}.{}",
            fingerprint(asset, params),
            output_extension(asset, params)
        )
    }

    /// Render the variant unless it is already cached; returns its path.
    fn materialize(&self, asset: &Asset, params: &TransformParams) -> Result<PathBuf, TransformError> {
        let output = self.cache_dir.join(self.file_name(asset, params));
        if output.exists() {
            log::trace!("cache hit {}", output.display());
            return Ok(output);
        }

        let source = self.source_root.join(asset.location());
        log::debug!(
            "rendering {} [{}] -> {}",
            source.display(),
            params.to_query_string(),
            output.display()
        );
        let img = image::open(&source)?;
        let img = apply(img, params, asset.focus)?;
        let bytes = encode(&img, &output_extension(asset, params), params.quality)?;

        // Readers only ever see complete files: write aside, then rename.
        std::fs::create_dir_all(&self.cache_dir)?;
        let mut staged = NamedTempFile::new_in(&self.cache_dir)?;
        staged.write_all(&bytes)?;
        staged.persist(&output).map_err(|e| e.error)?;
        Ok(output)
    }
}

impl TransformEngine for RenderEngine {
    fn url(&self, asset: &Asset, params: &TransformParams) -> Result<String, TransformError> {
        let path = self.materialize(asset, params)?;
        let file = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| TransformError::Failed(format!("bad cache path {}", path.display())))?;
        let url = format!("{}/{}", self.url_prefix.trim_end_matches('/'), file);
        Ok(match &self.app_url {
            Some(app) => format!("{}{}", app.trim_end_matches('/'), url),
            None => url,
        })
    }

    fn render(
        &self,
        asset: &Asset,
        params: &TransformParams,
    ) -> Result<RenderedImage, TransformError> {
        let path = self.materialize(asset, params)?;
        let bytes = std::fs::read(&path)?;
        Ok(RenderedImage {
            bytes,
            mime_type: mime_for_extension(&output_extension(asset, params)).to_string(),
        })
    }
}

/// File extension of the rendered output.
///
/// The requested format wins; otherwise the original's format is kept when an
/// encoder exists for it, and PNG is used for everything else.
fn output_extension(asset: &Asset, params: &TransformParams) -> String {
    let requested = params.format.as_deref().unwrap_or(&asset.extension);
    match requested.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "pjpg" => "jpg".to_string(),
        "webp" => "webp".to_string(),
        "avif" => "avif".to_string(),
        _ => "png".to_string(),
    }
}

/// Focus point encoded in a `crop-x-y[-zoom]` fit, if any.
fn crop_focus(fit: &str, fallback: FocusPoint) -> Option<FocusPoint> {
    match fit {
        "crop" => Some(fallback),
        _ => fit
            .strip_prefix("crop-")
            .map(|focus| focus.parse().unwrap_or(fallback)),
    }
}

fn apply(
    img: DynamicImage,
    params: &TransformParams,
    focus: FocusPoint,
) -> Result<DynamicImage, TransformError> {
    let source = (img.width(), img.height());
    if source.0 == 0 || source.1 == 0 {
        return Err(TransformError::Failed("source image has no pixels".into()));
    }
    let fit = params.fit.as_deref().or(match params.passthrough.get("fit") {
        Some(Scalar::Str(s)) => Some(s.as_str()),
        _ => None,
    });

    let img = match (params.width, params.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => match fit {
            Some("fill") => img.resize_exact(w, h, FilterType::Lanczos3),
            Some(fit) if crop_focus(fit, focus).is_some() => {
                let focus = crop_focus(fit, focus).unwrap_or(focus);
                let filled = fill_dimensions(source, (w, h));
                let (x, y) = focal_offset(filled, (w, h), focus);
                img.resize_exact(filled.0, filled.1, FilterType::Lanczos3)
                    .crop_imm(x, y, w, h)
            }
            _ => img.resize(w, h, FilterType::Lanczos3),
        },
        (Some(w), _) if w > 0 => {
            img.resize_exact(w, proportional_height(source, w), FilterType::Lanczos3)
        }
        (_, Some(h)) if h > 0 => {
            img.resize_exact(proportional_width(source, h), h, FilterType::Lanczos3)
        }
        _ => img,
    };

    Ok(match params.numeric("blur") {
        Some(sigma) if sigma > 0.0 => img.blur(sigma as f32),
        _ => img,
    })
}

fn encode(img: &DynamicImage, extension: &str, quality: Option<u32>) -> Result<Vec<u8>, TransformError> {
    let quality = quality.unwrap_or(DEFAULT_QUALITY).clamp(1, 100) as u8;
    let mut buf = Vec::new();
    match extension {
        "jpg" => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
        }
        "webp" => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buf))?;
        }
        "avif" => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(AvifEncoder::new_with_speed_quality(
                &mut buf, AVIF_SPEED, quality,
            ))?;
        }
        _ => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(PngEncoder::new(&mut buf))?;
        }
    }
    Ok(buf)
}
