//! Hosted releases on GitHub.

use crate::config::GitHubRepo;
use crate::error::{PublishError, Result};
use crate::version::ReleaseTag;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use url::Url;

/// GitHub REST API version header value
const API_VERSION: &str = "2022-11-28";

/// Release to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelease {
    /// Tag the release points at (must already be pushed)
    pub tag: ReleaseTag,
    /// Release title
    pub name: String,
    /// Whether the host should flag this as a pre-release
    pub prerelease: bool,
}

impl NewRelease {
    /// Release for `tag`, titled without the leading `v`
    pub fn for_tag(tag: &ReleaseTag) -> Self {
        Self {
            tag: tag.clone(),
            name: tag.display_name().to_string(),
            prerelease: tag.is_prerelease(),
        }
    }
}

/// Release as recorded by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedRelease {
    /// Stable numeric id
    pub id: u64,
    /// Web page of the release
    pub html_url: String,
    /// Names of assets already attached
    #[serde(default)]
    pub assets: Vec<String>,
}

/// Asset attached to a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    /// Asset name
    pub name: String,
    /// Size in bytes as reported by the host
    pub size: u64,
    /// Public download URL
    pub download_url: String,
}

/// Service that hosts releases and their downloadable assets
pub trait ReleaseHost: Send + Sync + 'static {
    /// Check that the credentials can publish to the repository
    fn verify_access(&self) -> impl Future<Output = Result<()>> + Send;

    /// Existing release for `tag`, if any
    fn find_release(&self, tag: &ReleaseTag)
    -> impl Future<Output = Result<Option<HostedRelease>>> + Send;

    /// Create a release for an already pushed tag
    fn create_release(
        &self,
        release: &NewRelease,
    ) -> impl Future<Output = Result<HostedRelease>> + Send;

    /// Attach the file at `path` to a release as `name`
    fn upload_asset(
        &self,
        release_id: u64,
        name: &str,
        path: &Path,
    ) -> impl Future<Output = Result<UploadedAsset>> + Send;

    /// Remove the asset `name` from a release; `false` when it was not there
    fn delete_asset(&self, release_id: u64, name: &str)
    -> impl Future<Output = Result<bool>> + Send;

    /// Save the asset `name` of a release to `dest`
    fn download_asset(
        &self,
        release_id: u64,
        name: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    html_url: String,
    #[serde(default)]
    assets: Vec<AssetResponse>,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    #[serde(default)]
    id: u64,
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    browser_download_url: String,
}

#[derive(Debug, Serialize)]
struct CreateReleaseRequest<'a> {
    tag_name: &'a str,
    name: &'a str,
    draft: bool,
    prerelease: bool,
}

impl From<ReleaseResponse> for HostedRelease {
    fn from(response: ReleaseResponse) -> Self {
        Self {
            id: response.id,
            html_url: response.html_url,
            assets: response.assets.into_iter().map(|a| a.name).collect(),
        }
    }
}

/// GitHub REST implementation of [`ReleaseHost`]
#[derive(Debug, Clone)]
pub struct GitHubReleaseHost {
    client: Client,
    api_url: Url,
    uploads_url: Url,
    repo: GitHubRepo,
    token: String,
}

impl GitHubReleaseHost {
    /// Create a host client for `repo`
    pub fn new(api_url: Url, uploads_url: Url, repo: GitHubRepo, token: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PublishError::HostUnavailable {
                reason: format!("building HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_url,
            uploads_url,
            repo,
            token,
        })
    }

    /// Repository releases are published to
    pub fn repo(&self) -> &GitHubRepo {
        &self.repo
    }

    fn endpoint(base: &Url, path: &str) -> String {
        format!("{}{}", base.as_str().trim_end_matches('/'), path)
    }

    fn repo_path(&self) -> String {
        format!("/repos/{}/{}", self.repo.owner, self.repo.name)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.request_accepting(method, url, "application/vnd.github+json")
    }

    fn request_accepting(
        &self,
        method: reqwest::Method,
        url: &str,
        accept: &str,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, accept)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    fn asset_url(&self, asset_id: u64) -> String {
        Self::endpoint(
            &self.api_url,
            &format!("{}/releases/assets/{}", self.repo_path(), asset_id),
        )
    }

    /// Id of the asset `name` on a release
    async fn asset_id(&self, release_id: u64, name: &str) -> Result<Option<u64>> {
        let unavailable = |reason: String| PublishError::HostUnavailable { reason };

        let url = Self::endpoint(
            &self.api_url,
            &format!("{}/releases/{}/assets?per_page=100", self.repo_path(), release_id),
        );
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!(
                "listing assets of release {}: {} {}",
                release_id,
                status,
                body.trim()
            ))
            .into());
        }

        let assets: Vec<AssetResponse> = response
            .json()
            .await
            .map_err(|e| unavailable(format!("decoding assets of release {}: {}", release_id, e)))?;
        Ok(assets.into_iter().find(|a| a.name == name).map(|a| a.id))
    }
}

/// MIME type for an asset, by file name
fn content_type(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".zip") {
        "application/zip"
    } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") || lower.ends_with(".gz") {
        "application/gzip"
    } else if lower.ends_with("sums") || lower.ends_with(".txt") {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

impl ReleaseHost for GitHubReleaseHost {
    async fn verify_access(&self) -> Result<()> {
        let url = Self::endpoint(&self.api_url, &self.repo_path());
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| PublishError::HostUnavailable {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::HostUnavailable {
                reason: format!("{} {}: {}", status, self.repo, body.trim()),
            }
            .into());
        }

        log::debug!("release host access to {} verified", self.repo);
        Ok(())
    }

    async fn find_release(&self, tag: &ReleaseTag) -> Result<Option<HostedRelease>> {
        let url = Self::endpoint(
            &self.api_url,
            &format!("{}/releases/tags/{}", self.repo_path(), tag),
        );
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| PublishError::HostUnavailable {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::HostUnavailable {
                reason: format!("looking up release {}: {} {}", tag, status, body.trim()),
            }
            .into());
        }

        let release: ReleaseResponse =
            response
                .json()
                .await
                .map_err(|e| PublishError::HostUnavailable {
                    reason: format!("decoding release {}: {}", tag, e),
                })?;
        Ok(Some(release.into()))
    }

    async fn create_release(&self, release: &NewRelease) -> Result<HostedRelease> {
        let failed = |reason: String| PublishError::ReleaseCreationFailed {
            tag: release.tag.to_string(),
            reason,
        };

        let url = Self::endpoint(&self.api_url, &format!("{}/releases", self.repo_path()));
        let body = CreateReleaseRequest {
            tag_name: release.tag.as_str(),
            name: &release.name,
            draft: false,
            prerelease: release.prerelease,
        };

        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failed(format!("{}: {}", status, text.trim())).into());
        }

        let created: ReleaseResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("decoding response: {}", e)))?;
        Ok(created.into())
    }

    async fn upload_asset(&self, release_id: u64, name: &str, path: &Path) -> Result<UploadedAsset> {
        let failed = |reason: String| PublishError::AssetUploadFailed {
            asset: name.to_string(),
            reason,
        };

        let mut url = Url::parse(&Self::endpoint(
            &self.uploads_url,
            &format!("{}/releases/{}/assets", self.repo_path(), release_id),
        ))
        .map_err(|e| failed(e.to_string()))?;
        url.query_pairs_mut().append_pair("name", name);

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| failed(format!("opening {}: {}", path.display(), e)))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| failed(e.to_string()))?
            .len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let response = self
            .request(reqwest::Method::POST, url.as_str())
            .header(CONTENT_TYPE, content_type(name))
            .header(CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failed(format!("{}: {}", status, text.trim())).into());
        }

        let asset: AssetResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("decoding response: {}", e)))?;
        Ok(UploadedAsset {
            name: asset.name,
            size: asset.size,
            download_url: asset.browser_download_url,
        })
    }

    async fn delete_asset(&self, release_id: u64, name: &str) -> Result<bool> {
        let Some(asset_id) = self.asset_id(release_id, name).await? else {
            return Ok(false);
        };
        let failed = |reason: String| PublishError::AssetDeleteFailed {
            asset: name.to_string(),
            reason,
        };

        let response = self
            .request(reqwest::Method::DELETE, &self.asset_url(asset_id))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failed(format!("{}: {}", status, text.trim())).into());
        }

        log::debug!("deleted asset {} ({}) from release {}", name, asset_id, release_id);
        Ok(true)
    }

    async fn download_asset(&self, release_id: u64, name: &str, dest: &Path) -> Result<()> {
        let failed = |reason: String| PublishError::AssetDownloadFailed {
            asset: name.to_string(),
            reason,
        };

        let asset_id = self
            .asset_id(release_id, name)
            .await?
            .ok_or_else(|| failed(format!("not attached to release {}", release_id)))?;

        // The host redirects to storage; reqwest drops the token on the way
        let mut response = self
            .request_accepting(
                reqwest::Method::GET,
                &self.asset_url(asset_id),
                "application/octet-stream",
            )
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failed(format!("{}: {}", status, text.trim())).into());
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| failed(format!("creating {}: {}", dest.display(), e)))?;
        while let Some(chunk) = response.chunk().await.map_err(|e| failed(e.to_string()))? {
            file.write_all(&chunk)
                .await
                .map_err(|e| failed(format!("writing {}: {}", dest.display(), e)))?;
        }
        file.flush()
            .await
            .map_err(|e| failed(format!("writing {}: {}", dest.display(), e)))?;
        Ok(())
    }
}
