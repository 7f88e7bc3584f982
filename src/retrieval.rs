use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::domain::{Credentials, DatasetSlug, file_base_name};
use crate::error::ImportError;
use crate::fs_util::extract_zip;
use crate::kaggle::{DownloadInfo, KaggleClient};

pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalStatus {
    NotStarted,
    Downloading,
    Resolved(PathBuf),
    Failed,
}

pub struct RetrievalPipeline<'a, C> {
    client: &'a C,
    slug: DatasetSlug,
    file_name: String,
    work_dir: PathBuf,
    settle: Duration,
    status: RetrievalStatus,
}

impl<'a, C: KaggleClient> RetrievalPipeline<'a, C> {
    pub fn new(
        client: &'a C,
        slug: DatasetSlug,
        file_name: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            slug,
            file_name: file_name.into(),
            work_dir: work_dir.into(),
            settle: DEFAULT_SETTLE,
            status: RetrievalStatus::NotStarted,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn status(&self) -> &RetrievalStatus {
        &self.status
    }

    pub fn local_path(&self) -> PathBuf {
        self.work_dir.join(file_base_name(&self.file_name))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.work_dir
            .join(format!("{}.zip", file_base_name(&self.file_name)))
    }

    pub fn download(&mut self, credentials: &Credentials) -> Result<DownloadInfo, ImportError> {
        self.status = RetrievalStatus::Downloading;
        info!(dataset = %self.slug, file = %self.file_name, "downloading from kaggle");
        let result = self.client.authenticate(credentials).and_then(|_| {
            self.client
                .download_file(credentials, &self.slug, &self.file_name, &self.work_dir)
        });
        result.inspect_err(|_| self.status = RetrievalStatus::Failed)
    }

    pub fn resolve(&mut self) -> Result<PathBuf, ImportError> {
        let result = self.resolve_inner();
        self.status = match &result {
            Ok(path) => RetrievalStatus::Resolved(path.clone()),
            Err(_) => RetrievalStatus::Failed,
        };
        result
    }

    pub fn run(&mut self, credentials: &Credentials) -> Result<PathBuf, ImportError> {
        self.download(credentials)?;
        self.resolve()
    }

    fn resolve_inner(&self) -> Result<PathBuf, ImportError> {
        let local = self.local_path();
        let archive = self.archive_path();
        wait_for_any(&[local.as_path(), archive.as_path()], self.settle);

        if local.is_file() {
            debug!(path = %local.display(), "file present");
            return Ok(local);
        }
        if !archive.is_file() {
            return Err(ImportError::FileNotFound(local));
        }

        info!(archive = %archive.display(), "unpacking downloaded archive");
        let extracted = extract_zip(&archive, &self.work_dir)?;
        debug!(extracted, "archive unpacked");
        if local.is_file() {
            return Ok(local);
        }
        Err(ImportError::ArchiveMissingFile {
            archive,
            file: self.file_name.clone(),
        })
    }
}

fn wait_for_any(paths: &[&Path], timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !paths.iter().any(|path| path.exists()) && Instant::now() < deadline {
        thread::sleep(POLL_INTERVAL.min(timeout));
    }
}
