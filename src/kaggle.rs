use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Credentials, DatasetSlug, file_base_name};
use crate::error::ImportError;

pub const DEFAULT_BASE_URL: &str = "https://www.kaggle.com/api/v1";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteDatasetSummary {
    pub slug: DatasetSlug,
    pub title: String,
    pub size: u64,
    pub tags: Vec<String>,
    pub versions: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadInfo {
    pub path: PathBuf,
    pub is_zip: bool,
}

pub trait KaggleClient: Send + Sync {
    fn authenticate(&self, credentials: &Credentials) -> Result<(), ImportError>;
    fn search_datasets(
        &self,
        credentials: &Credentials,
        term: &str,
    ) -> Result<Vec<RemoteDatasetSummary>, ImportError>;
    fn list_files(
        &self,
        credentials: &Credentials,
        slug: &DatasetSlug,
    ) -> Result<Vec<String>, ImportError>;
    fn download_file(
        &self,
        credentials: &Credentials,
        slug: &DatasetSlug,
        file_name: &str,
        destination_dir: &Path,
    ) -> Result<DownloadInfo, ImportError>;
}

pub fn check_credentials(credentials: &Credentials) -> Result<(), ImportError> {
    if credentials.username.trim().is_empty() {
        return Err(ImportError::MissingCredentials("username is empty".to_string()));
    }
    if credentials.key.is_empty() {
        return Err(ImportError::MissingCredentials("api key is empty".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct KaggleHttpClient {
    client: Client,
    base_url: String,
}

impl KaggleHttpClient {
    pub fn new() -> Result<Self, ImportError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ImportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kaggle-import/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ImportError::RemoteService(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| ImportError::RemoteService(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ImportError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "kaggle request failed".to_string());
        Err(ImportError::RemoteStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, ImportError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, delay, "retrying kaggle request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(error = %err, delay, "retrying kaggle request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(ImportError::RemoteService(err.to_string()));
                }
            }
        }
    }

    pub fn download_url(&self, slug: &DatasetSlug, file_name: &str) -> Result<Url, ImportError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|err| ImportError::RemoteService(err.to_string()))?;
        // names arrive with spaces already written as %20
        url.path_segments_mut()
            .map_err(|_| ImportError::RemoteService(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(["datasets", "download", slug.owner(), slug.name()])
            .extend(file_name.split('/').map(|segment| segment.replace("%20", " ")));
        Ok(url)
    }

    fn get(&self, credentials: &Credentials, url: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .get(url)
            .basic_auth(&credentials.username, Some(credentials.key.expose()))
    }
}

impl KaggleClient for KaggleHttpClient {
    fn authenticate(&self, credentials: &Credentials) -> Result<(), ImportError> {
        check_credentials(credentials)
    }

    fn search_datasets(
        &self,
        credentials: &Credentials,
        term: &str,
    ) -> Result<Vec<RemoteDatasetSummary>, ImportError> {
        let url = format!("{}/datasets/list", self.base_url);
        debug!(term, "searching kaggle datasets");
        let response =
            self.send_with_retries(|| self.get(credentials, &url).query(&[("search", term)]))?;
        let rows: Vec<DatasetRow> = Self::handle_status(response)?
            .json()
            .map_err(|err| ImportError::RemoteService(err.to_string()))?;
        Ok(rows.into_iter().filter_map(DatasetRow::into_summary).collect())
    }

    fn list_files(
        &self,
        credentials: &Credentials,
        slug: &DatasetSlug,
    ) -> Result<Vec<String>, ImportError> {
        let url = format!(
            "{}/datasets/list/{}/{}",
            self.base_url,
            slug.owner(),
            slug.name()
        );
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let response = self.send_with_retries(|| {
                let request = self.get(credentials, &url);
                match &page_token {
                    Some(token) => request.query(&[("pageToken", token.as_str())]),
                    None => request,
                }
            })?;
            let page: FileListPage = Self::handle_status(response)?
                .json()
                .map_err(|err| ImportError::RemoteService(err.to_string()))?;
            if let Some(message) = page.error_message.filter(|msg| !msg.is_empty()) {
                return Err(ImportError::RemoteService(message));
            }
            files.extend(page.dataset_files.into_iter().map(|file| file.name));
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        debug!(dataset = %slug, count = files.len(), "listed dataset files");
        Ok(files)
    }

    fn download_file(
        &self,
        credentials: &Credentials,
        slug: &DatasetSlug,
        file_name: &str,
        destination_dir: &Path,
    ) -> Result<DownloadInfo, ImportError> {
        let url = self.download_url(slug, file_name)?;
        let response = self.send_with_retries(|| self.get(credentials, url.as_str()))?;
        let mut response = Self::handle_status(response)?;
        let is_zip = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("zip"))
            .unwrap_or(false)
            && !file_name.to_ascii_lowercase().ends_with(".zip");

        let base_name = file_base_name(file_name);
        let path = if is_zip {
            destination_dir.join(format!("{base_name}.zip"))
        } else {
            destination_dir.join(base_name)
        };
        let mut file =
            File::create(&path).map_err(|err| ImportError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| ImportError::Filesystem(err.to_string()))?;
        debug!(path = %path.display(), is_zip, "download written");
        Ok(DownloadInfo { path, is_zip })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetRow {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    total_bytes: Option<u64>,
    #[serde(default)]
    tags: Vec<TagRow>,
    #[serde(default)]
    versions: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TagRow {
    #[serde(default)]
    name: String,
}

impl DatasetRow {
    fn into_summary(self) -> Option<RemoteDatasetSummary> {
        let slug = self.reference.parse().ok()?;
        Some(RemoteDatasetSummary {
            slug,
            title: self.title.unwrap_or_default(),
            size: self.total_bytes.unwrap_or(0),
            tags: self.tags.into_iter().map(|tag| tag.name).collect(),
            versions: self.versions.len(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListPage {
    #[serde(default)]
    dataset_files: Vec<FileRow>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileRow {
    name: String,
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
