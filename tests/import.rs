use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use assert_matches::assert_matches;

use kaggle_import::context::{ExecutionContext, ExecutionReport, ReportChannel, UserIdentity};
use kaggle_import::domain::{Credentials, DatasetSlug, SinkId};
use kaggle_import::error::ImportError;
use kaggle_import::import::{ImportOptions, ImportSettings, ImportTask, NO_USER_WARNING};
use kaggle_import::kaggle::{DownloadInfo, KaggleClient, RemoteDatasetSummary};
use kaggle_import::publish::{PublishReceipt, ResourceSink, ResourceStream};

struct MockKaggle {
    files: Vec<String>,
    downloads: Mutex<Vec<String>>,
}

impl MockKaggle {
    fn with_files(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|name| name.to_string()).collect(),
            downloads: Mutex::new(Vec::new()),
        }
    }
}

impl KaggleClient for &MockKaggle {
    fn authenticate(&self, _credentials: &Credentials) -> Result<(), ImportError> {
        Ok(())
    }

    fn search_datasets(
        &self,
        _credentials: &Credentials,
        _term: &str,
    ) -> Result<Vec<RemoteDatasetSummary>, ImportError> {
        Ok(Vec::new())
    }

    fn list_files(
        &self,
        _credentials: &Credentials,
        _slug: &DatasetSlug,
    ) -> Result<Vec<String>, ImportError> {
        Ok(self.files.clone())
    }

    fn download_file(
        &self,
        _credentials: &Credentials,
        _slug: &DatasetSlug,
        file_name: &str,
        destination_dir: &Path,
    ) -> Result<DownloadInfo, ImportError> {
        self.downloads.lock().unwrap().push(file_name.to_string());
        let path = destination_dir.join(file_name);
        fs::write(&path, b"a,b\n1,2\n").unwrap();
        Ok(DownloadInfo {
            path,
            is_zip: false,
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    writes: Mutex<Vec<(String, PathBuf, Vec<u8>, Option<String>)>>,
}

impl ResourceSink for &RecordingSink {
    fn write_resource(
        &self,
        sink: &SinkId,
        mut stream: ResourceStream,
        acting_user: Option<&UserIdentity>,
    ) -> Result<PublishReceipt, ImportError> {
        let mut content = Vec::new();
        stream.read_to_end(&mut content).unwrap();
        let bytes = content.len() as u64;
        self.writes.lock().unwrap().push((
            sink.to_string(),
            stream.path().to_path_buf(),
            content,
            acting_user.map(|user| user.uri.clone()),
        ));
        Ok(PublishReceipt {
            sink: sink.to_string(),
            location: "memory".to_string(),
            bytes,
        })
    }
}

#[derive(Default)]
struct RecordingChannel {
    updates: Mutex<Vec<ExecutionReport>>,
}

impl ReportChannel for RecordingChannel {
    fn update(&self, report: &ExecutionReport) {
        self.updates.lock().unwrap().push(report.clone());
    }
}

fn settings(dataset: &str, file: &str, sink: &str) -> ImportSettings {
    ImportSettings {
        credentials: Credentials::new("alice", "key"),
        dataset: dataset.to_string(),
        file_name: file.to_string(),
        sink_name: sink.to_string(),
    }
}

fn options(work_dir: &Path) -> ImportOptions {
    ImportOptions {
        work_dir: work_dir.to_path_buf(),
        settle: Duration::ZERO,
    }
}

#[test]
fn import_publishes_downloaded_file() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockKaggle::with_files(&["data.csv", "other.csv"]);
    let sink = RecordingSink::default();
    let channel = RecordingChannel::default();

    let task = ImportTask::new(
        &client,
        &sink,
        settings("owner/ds", "data.csv", "proj:out"),
        options(temp.path()),
    )
    .unwrap();
    let context = ExecutionContext::new("proj").with_user("urn:user:alice");
    let report = task.execute(&context, &channel).unwrap();

    assert_eq!(report.entity_count, 1);
    assert_eq!(report.operation, "write");
    assert!(report.warnings.is_empty());
    assert!(
        report
            .summary
            .contains(&("Executed by".to_string(), "urn:user:alice".to_string()))
    );

    let writes = sink.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    let (sink_id, path, content, user) = &writes[0];
    assert_eq!(sink_id, "proj:out");
    assert_eq!(path, &temp.path().join("data.csv"));
    assert_eq!(content, b"a,b\n1,2\n");
    assert_eq!(user.as_deref(), Some("urn:user:alice"));
    assert_eq!(*channel.updates.lock().unwrap(), vec![report]);
}

#[test]
fn default_work_dir_is_current_directory() {
    assert_eq!(
        ImportOptions::default().work_dir.join("data.csv"),
        PathBuf::from("./data.csv")
    );
}

#[test]
fn missing_file_fails_before_download() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockKaggle::with_files(&["data.csv"]);
    let sink = RecordingSink::default();

    let err = ImportTask::new(
        &client,
        &sink,
        settings("owner/ds", "missing.csv", "proj:out"),
        options(temp.path()),
    )
    .err()
    .unwrap();

    assert_matches!(
        err,
        ImportError::FileNotInDataset { ref file, ref available }
            if file == "missing.csv" && available == &vec!["data.csv".to_string()]
    );
    assert!(client.downloads.lock().unwrap().is_empty());
}

#[test]
fn malformed_dataset_fails_construction() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockKaggle::with_files(&["data.csv"]);
    let sink = RecordingSink::default();

    let err = ImportTask::new(
        &client,
        &sink,
        settings("owner-ds", "data.csv", "out"),
        options(temp.path()),
    )
    .err()
    .unwrap();
    assert_matches!(err, ImportError::InvalidDataset(_));
}

#[test]
fn file_match_ignores_case() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockKaggle::with_files(&["data.csv"]);
    let sink = RecordingSink::default();

    let task = ImportTask::new(
        &client,
        &sink,
        settings("owner/ds", "DATA.CSV", "out"),
        options(temp.path()),
    )
    .unwrap();
    assert_eq!(task.config().file_name, "data.csv");
}

#[test]
fn missing_user_is_a_warning() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockKaggle::with_files(&["my data.csv"]);
    let sink = RecordingSink::default();
    let channel = RecordingChannel::default();

    let task = ImportTask::new(
        &client,
        &sink,
        settings("owner/ds", "my data.csv", "out"),
        options(temp.path()),
    )
    .unwrap();
    let report = task
        .execute(&ExecutionContext::new("proj"), &channel)
        .unwrap();

    assert_eq!(report.warnings, vec![NO_USER_WARNING.to_string()]);
    assert_eq!(*client.downloads.lock().unwrap(), vec!["my%20data.csv"]);

    let writes = sink.writes.lock().unwrap();
    assert_eq!(writes[0].0, "proj:out");
    assert_eq!(writes[0].1, temp.path().join("my%20data.csv"));
    assert_eq!(writes[0].3, None);
}
