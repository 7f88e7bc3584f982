use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::{Body, Client};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tracing::info;

use crate::context::UserIdentity;
use crate::domain::SinkId;
use crate::error::ImportError;

pub struct ResourceStream {
    path: PathBuf,
    file: File,
}

impl ResourceStream {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ImportError> {
        let path = path.into();
        let file = File::open(&path).map_err(|err| {
            ImportError::Filesystem(format!("open {}: {err}", path.display()))
        })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> Result<u64, ImportError> {
        self.file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| ImportError::Filesystem(err.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, ImportError> {
        Ok(self.len()? == 0)
    }

    fn into_file(self) -> File {
        self.file
    }
}

impl Read for ResourceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    pub sink: String,
    pub location: String,
    pub bytes: u64,
}

pub trait ResourceSink {
    fn write_resource(
        &self,
        sink: &SinkId,
        stream: ResourceStream,
        acting_user: Option<&UserIdentity>,
    ) -> Result<PublishReceipt, ImportError>;
}

pub fn publish<S: ResourceSink + ?Sized>(
    sink: &S,
    sink_id: &SinkId,
    path: &Path,
    acting_user: Option<&UserIdentity>,
) -> Result<PublishReceipt, ImportError> {
    let stream = ResourceStream::open(path)?;
    info!(sink = %sink_id, source = %path.display(), "publishing resource");
    sink.write_resource(sink_id, stream, acting_user)
}

#[derive(Debug, Clone)]
pub struct FileResourceSink {
    root: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceMetadata {
    pub sink: String,
    pub source_path: String,
    pub bytes: u64,
    pub written_by: Option<String>,
    pub written_at: String,
    pub tool: String,
}

impl FileResourceSink {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn resource_path(&self, sink: &SinkId) -> Utf8PathBuf {
        self.root.join(sink.project()).join(sink.resource())
    }

    pub fn metadata_path(&self, sink: &SinkId) -> Utf8PathBuf {
        self.root
            .join(sink.project())
            .join(format!("{}.meta.json", sink.resource()))
    }
}

impl ResourceSink for FileResourceSink {
    fn write_resource(
        &self,
        sink: &SinkId,
        stream: ResourceStream,
        acting_user: Option<&UserIdentity>,
    ) -> Result<PublishReceipt, ImportError> {
        let dest = self.resource_path(sink);
        let parent = dest
            .parent()
            .ok_or_else(|| ImportError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| ImportError::Filesystem(err.to_string()))?;

        let source_path = stream.path().display().to_string();
        let mut temp = tempfile::Builder::new()
            .prefix("kaggle-import-resource")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| ImportError::Filesystem(err.to_string()))?;
        let mut reader = stream;
        let bytes = io::copy(&mut reader, temp.as_file_mut())
            .map_err(|err| ImportError::Filesystem(err.to_string()))?;
        if dest.as_std_path().exists() {
            fs::remove_file(dest.as_std_path())
                .map_err(|err| ImportError::Filesystem(err.to_string()))?;
        }
        temp.persist(dest.as_std_path())
            .map_err(|err| ImportError::Filesystem(err.to_string()))?;

        let metadata = ResourceMetadata {
            sink: sink.to_string(),
            source_path,
            bytes,
            written_by: acting_user.map(|user| user.uri.clone()),
            written_at: chrono::Utc::now().to_rfc3339(),
            tool: format!("kaggle-import/{}", env!("CARGO_PKG_VERSION")),
        };
        let content = serde_json::to_vec_pretty(&metadata)
            .map_err(|err| ImportError::Filesystem(err.to_string()))?;
        fs::write(self.metadata_path(sink).as_std_path(), content)
            .map_err(|err| ImportError::Filesystem(err.to_string()))?;

        Ok(PublishReceipt {
            sink: sink.to_string(),
            location: dest.to_string(),
            bytes,
        })
    }
}

#[derive(Clone)]
pub struct HttpResourceSink {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpResourceSink {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ImportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kaggle-import/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ImportError::SinkHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| ImportError::SinkHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn resource_url(&self, sink: &SinkId) -> String {
        format!(
            "{}/workspace/projects/{}/resources/{}",
            self.base_url,
            sink.project(),
            sink.resource()
        )
    }
}

impl ResourceSink for HttpResourceSink {
    fn write_resource(
        &self,
        sink: &SinkId,
        stream: ResourceStream,
        acting_user: Option<&UserIdentity>,
    ) -> Result<PublishReceipt, ImportError> {
        let url = self.resource_url(sink);
        let bytes = stream.len()?;
        let mut request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Body::sized(stream.into_file(), bytes));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        info!(
            url = %url,
            user = acting_user.map(|user| user.uri.as_str()).unwrap_or("-"),
            "uploading resource"
        );
        let response = request
            .send()
            .map_err(|err| ImportError::SinkHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "resource upload failed".to_string());
            return Err(ImportError::SinkStatus { status, message });
        }
        Ok(PublishReceipt {
            sink: sink.to_string(),
            location: url,
            bytes,
        })
    }
}
