//! URL engine for on-the-fly image servers.
//!
//! Produces `<base_url>/<asset path>?<query>`, optionally signed with
//! `&s=<sha256(key + path + "?" + query)>` and prefixed with the application
//! URL when absolute URLs are forced. Nothing is rendered locally.

use super::{RenderedImage, TransformEngine, TransformError};
use crate::asset::Asset;
use crate::config::Config;
use crate::params::TransformParams;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct UrlEngine {
    base_url: String,
    app_url: Option<String>,
    sign_key: Option<String>,
}

impl UrlEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_url: None,
            sign_key: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let transform = &config.transform;
        Self {
            base_url: transform.base_url.clone(),
            app_url: transform
                .app_url
                .clone()
                .filter(|_| config.force_absolute_urls),
            sign_key: transform.sign_key.clone(),
        }
    }

    pub fn with_app_url(mut self, app_url: impl Into<String>) -> Self {
        self.app_url = Some(app_url.into());
        self
    }

    pub fn with_sign_key(mut self, key: impl Into<String>) -> Self {
        self.sign_key = Some(key.into());
        self
    }

    fn signature(&self, key: &str, path: &str, query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(path.as_bytes());
        hasher.update(b"?");
        hasher.update(query.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl TransformEngine for UrlEngine {
    fn url(&self, asset: &Asset, params: &TransformParams) -> Result<String, TransformError> {
        let path = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            asset.location()
        );
        let query = params.to_query_string();

        let mut url = path.clone();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        if let Some(key) = &self.sign_key {
            url.push(if query.is_empty() { '?' } else { '&' });
            url.push_str("s=");
            url.push_str(&self.signature(key, &path, &query));
        }

        Ok(match &self.app_url {
            Some(app) => format!("{}{}", app.trim_end_matches('/'), url),
            None => url,
        })
    }

    fn render(
        &self,
        _asset: &Asset,
        _params: &TransformParams,
    ) -> Result<RenderedImage, TransformError> {
        Err(TransformError::Unsupported {
            engine: "url",
            operation: "render image bytes",
        })
    }
}
