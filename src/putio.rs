//! put.io API v2 client
//!
//! `FileService` is the boundary the rest of the crate talks to; `PutioClient`
//! is the reqwest-backed implementation. Tests substitute in-memory fakes.

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::error::{Error, Result};

pub const BASE_URL: &str = "https://api.put.io/v2";

/// put.io file identifier; 0 is the account root.
pub type FileId = i64;
pub type ZipId = i64;

pub const ROOT_ID: FileId = 0;

/// One row of a directory listing. Snapshots are replaced wholesale on re-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: FileId,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub content_type: String,
}

/// Where a download can be fetched from once the server has produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSource {
    pub url: String,
    pub filename: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleStatus {
    Pending,
    Ready { url: String, size: u64 },
}

/// Response body of a download URL.
pub struct RemoteStream {
    /// Content-Length if the server sent one
    pub content_length: Option<u64>,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

#[async_trait]
pub trait FileService: Send + Sync {
    async fn list(&self, parent_id: FileId) -> Result<Vec<Entry>>;
    async fn delete(&self, ids: &[FileId]) -> Result<()>;
    async fn rename(&self, id: FileId, name: &str) -> Result<()>;
    async fn file_url(&self, id: FileId) -> Result<String>;
    async fn file_info(&self, id: FileId) -> Result<Entry>;
    async fn create_zip(&self, ids: &[FileId]) -> Result<ZipId>;
    async fn zip_status(&self, zip_id: ZipId) -> Result<BundleStatus>;
    async fn open(&self, url: &str) -> Result<RemoteStream>;
}

#[derive(Deserialize)]
struct FileRecord {
    id: FileId,
    name: String,
    #[serde(default)]
    file_type: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    content_type: Option<String>,
}

impl From<FileRecord> for Entry {
    fn from(r: FileRecord) -> Self {
        Entry {
            id: r.id,
            name: r.name,
            is_dir: r.file_type == "FOLDER",
            size: r.size.max(0) as u64,
            content_type: r.content_type.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct ListResponse {
    files: Vec<FileRecord>,
}

#[derive(Deserialize)]
struct FileResponse {
    file: FileRecord,
}

#[derive(Deserialize)]
struct UrlResponse {
    url: String,
}

#[derive(Deserialize)]
struct ZipCreateResponse {
    zip_id: ZipId,
}

#[derive(Deserialize)]
struct ZipResponse {
    // A string once ready; `false` or absent while the bundle is still building
    #[serde(default)]
    url: serde_json::Value,
    #[serde(default)]
    size: i64,
}

impl ZipResponse {
    fn status(self) -> BundleStatus {
        match self.url.as_str() {
            Some(url) if !url.is_empty() => BundleStatus::Ready {
                url: url.to_string(),
                size: self.size.max(0) as u64,
            },
            _ => BundleStatus::Pending,
        }
    }
}

fn join_ids(ids: &[FileId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}

/// Turn a non-2xx response into a `Service` error carrying the body text.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Service(format!("unexpected status {}: {}", status, body.trim())))
}

#[derive(Clone)]
pub struct PutioClient {
    http: Client,
    base_url: String,
    token: String,
}

impl PutioClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, BASE_URL)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("teleput/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check(resp).await
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<Response> {
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .form(form)
            .send()
            .await?;
        check(resp).await
    }
}

#[async_trait]
impl FileService for PutioClient {
    async fn list(&self, parent_id: FileId) -> Result<Vec<Entry>> {
        let body: ListResponse = self
            .get(&format!("/files/list?parent_id={}", parent_id))
            .await?
            .json()
            .await?;
        Ok(body.files.into_iter().map(Entry::from).collect())
    }

    async fn delete(&self, ids: &[FileId]) -> Result<()> {
        self.post_form("/files/delete", &[("file_ids", join_ids(ids))])
            .await?;
        Ok(())
    }

    async fn rename(&self, id: FileId, name: &str) -> Result<()> {
        self.post_form(
            "/files/rename",
            &[("file_id", id.to_string()), ("name", name.to_string())],
        )
        .await?;
        Ok(())
    }

    async fn file_url(&self, id: FileId) -> Result<String> {
        let body: UrlResponse = self.get(&format!("/files/{}/url", id)).await?.json().await?;
        Ok(body.url)
    }

    async fn file_info(&self, id: FileId) -> Result<Entry> {
        let body: FileResponse = self.get(&format!("/files/{}", id)).await?.json().await?;
        Ok(body.file.into())
    }

    async fn create_zip(&self, ids: &[FileId]) -> Result<ZipId> {
        let body: ZipCreateResponse = self
            .post_form("/zips/create", &[("file_ids", join_ids(ids))])
            .await?
            .json()
            .await?;
        Ok(body.zip_id)
    }

    async fn zip_status(&self, zip_id: ZipId) -> Result<BundleStatus> {
        let body: ZipResponse = self.get(&format!("/zips/{}", zip_id)).await?.json().await?;
        Ok(body.status())
    }

    async fn open(&self, url: &str) -> Result<RemoteStream> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Service(format!(
                "download failed: HTTP {}",
                resp.status().as_u16()
            )));
        }
        let content_length = resp.content_length();
        let body = resp
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(RemoteStream {
            content_length,
            reader: Box::new(StreamReader::new(Box::pin(body))),
        })
    }
}
