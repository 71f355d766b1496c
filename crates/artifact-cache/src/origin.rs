//! Remote artifact origins.
//!
//! An origin turns a [`ModReference`] into the bytes of a downloadable
//! file. [`HttpOrigin`] talks to a CurseForge-style project site: the
//! project page is located by id, then the file is downloaded from the
//! page's `files/<id>/download` route.

use crate::download::{file_name_from_url, get_checked};
use crate::error::{CacheError, Result};
use crate::reference::ModReference;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default project site.
pub const DEFAULT_ORIGIN_URL: &str = "https://minecraft.curseforge.com";

/// One fetched artifact, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    /// File name derived from the final download URL.
    pub file_name: String,
    /// Final URL the bytes were served from.
    pub source_url: String,
    pub bytes: Vec<u8>,
}

/// Source of artifact bytes.
#[async_trait]
pub trait ArtifactOrigin: Send + Sync {
    /// Fetch the artifact identified by `reference`.
    async fn fetch(&self, reference: &ModReference) -> Result<FetchedArtifact>;
}

/// Origin configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OriginConfig {
    /// Project site base URL
    pub base_url: String,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        OriginConfig {
            base_url: std::env::var("PACKFORGE_ORIGIN_URL")
                .unwrap_or_else(|_| DEFAULT_ORIGIN_URL.to_string()),
            user_agent: format!("packforge-artifact-cache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl OriginConfig {
    /// Create config for a specific project site
    pub fn new(base_url: &str) -> Self {
        OriginConfig {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }
}

/// HTTP origin for a CurseForge-style project site.
pub struct HttpOrigin {
    config: OriginConfig,
    http_client: reqwest::Client,
}

impl HttpOrigin {
    pub fn new(config: OriginConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CacheError::unreachable(&config.base_url, e))?;

        Ok(HttpOrigin {
            config,
            http_client,
        })
    }

    /// Shared HTTP client, also used for plain downloads.
    pub fn client(&self) -> &reqwest::Client {
        &self.http_client
    }

    fn project_url(&self, reference: &ModReference) -> String {
        format!(
            "{}/projects/{}/",
            self.config.base_url.trim_end_matches('/'),
            reference.project_id
        )
    }
}

/// Strip the `cookieTest` probe the project site appends on redirect.
pub fn clean_project_url(mut url: Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "cookieTest")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}

/// Download route for `file_id` under a project page.
pub fn download_url(project_page: &Url, file_id: u64) -> String {
    let mut page = project_page.clone();
    page.set_query(None);
    format!(
        "{}/files/{}/download",
        page.as_str().trim_end_matches('/'),
        file_id
    )
}

#[async_trait]
impl ArtifactOrigin for HttpOrigin {
    async fn fetch(&self, reference: &ModReference) -> Result<FetchedArtifact> {
        let project_url = self.project_url(reference);
        let page = get_checked(&self.http_client, &project_url).await?;
        let page_url = clean_project_url(page.url().clone());
        debug!(reference = %reference, page = %page_url, "resolved project page");

        let url = download_url(&page_url, reference.file_id);
        let response = get_checked(&self.http_client, &url).await?;
        let final_url = response.url().clone();
        let file_name = file_name_from_url(&final_url)
            .ok_or_else(|| CacheError::NoFileName(final_url.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CacheError::unreachable(&url, e))?;

        Ok(FetchedArtifact {
            file_name,
            source_url: final_url.to_string(),
            bytes: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_config_new() {
        let config = OriginConfig::new("https://mods.example.com");
        assert_eq!(config.base_url, "https://mods.example.com");
        assert!(config.user_agent.starts_with("packforge-artifact-cache/"));
    }

    #[test]
    fn project_url_uses_id() {
        let origin = HttpOrigin::new(OriginConfig::new("https://mods.example.com/")).unwrap();
        assert_eq!(
            origin.project_url(&ModReference::new(238222, 1)),
            "https://mods.example.com/projects/238222/"
        );
    }

    #[test]
    fn cookie_probe_is_removed() {
        let url = Url::parse("https://mods.example.com/projects/jei?cookieTest=1").unwrap();
        assert_eq!(
            clean_project_url(url).as_str(),
            "https://mods.example.com/projects/jei"
        );

        let url = Url::parse("https://mods.example.com/projects/jei?cookieTest=1&lang=en").unwrap();
        assert_eq!(
            clean_project_url(url).as_str(),
            "https://mods.example.com/projects/jei?lang=en"
        );
    }

    #[test]
    fn download_route_is_under_project_page() {
        let page = Url::parse("https://mods.example.com/projects/jei").unwrap();
        assert_eq!(
            download_url(&page, 2_740_866),
            "https://mods.example.com/projects/jei/files/2740866/download"
        );

        let page = Url::parse("https://mods.example.com/projects/jei/").unwrap();
        assert_eq!(
            download_url(&page, 5),
            "https://mods.example.com/projects/jei/files/5/download"
        );
    }
}
