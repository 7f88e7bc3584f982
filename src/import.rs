use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::context::{ExecutionContext, ExecutionReport, ReportChannel};
use crate::domain::{Credentials, DatasetSlug, SinkId, normalize_file_name, parse_dataset};
use crate::error::ImportError;
use crate::kaggle::KaggleClient;
use crate::publish::{ResourceSink, publish};
use crate::retrieval::{DEFAULT_SETTLE, RetrievalPipeline};

pub const NO_USER_WARNING: &str = "User information not available";

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub credentials: Credentials,
    pub dataset: String,
    pub file_name: String,
    pub sink_name: String,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub work_dir: PathBuf,
    pub settle: Duration,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            settle: DEFAULT_SETTLE,
        }
    }
}

// Validated task parameters. `file_name` carries the spelling reported by
// kaggle's file listing.
#[derive(Debug, Clone)]
pub struct ImportConfiguration {
    pub credentials: Credentials,
    pub dataset: DatasetSlug,
    pub file_name: String,
    pub sink_name: String,
}

impl ImportConfiguration {
    pub fn validate<C: KaggleClient>(
        client: &C,
        settings: ImportSettings,
    ) -> Result<Self, ImportError> {
        let dataset = parse_dataset(settings.dataset.trim())?;
        client.authenticate(&settings.credentials)?;
        let available = client.list_files(&settings.credentials, &dataset)?;
        let requested = settings.file_name.trim();
        let file_name = available
            .iter()
            .find(|candidate| candidate.to_lowercase() == requested.to_lowercase())
            .cloned()
            .ok_or_else(|| ImportError::FileNotInDataset {
                file: requested.to_string(),
                available: available.clone(),
            })?;
        Ok(Self {
            credentials: settings.credentials,
            dataset,
            file_name,
            sink_name: settings.sink_name,
        })
    }
}

pub struct ImportTask<C: KaggleClient, S: ResourceSink> {
    client: C,
    sink: S,
    config: ImportConfiguration,
    options: ImportOptions,
}

impl<C: KaggleClient, S: ResourceSink> ImportTask<C, S> {
    pub fn new(
        client: C,
        sink: S,
        settings: ImportSettings,
        options: ImportOptions,
    ) -> Result<Self, ImportError> {
        let config = ImportConfiguration::validate(&client, settings)?;
        info!(dataset = %config.dataset, file = %config.file_name, "import task configured");
        Ok(Self {
            client,
            sink,
            config,
            options,
        })
    }

    pub fn config(&self) -> &ImportConfiguration {
        &self.config
    }

    pub fn execute(
        &self,
        context: &ExecutionContext,
        channel: &dyn ReportChannel,
    ) -> Result<ExecutionReport, ImportError> {
        let sink_id = SinkId::qualify(&context.project_id, &self.config.sink_name)?;
        let mut report = ExecutionReport::default();

        match &context.user {
            Some(user) => report
                .summary
                .push(("Executed by".to_string(), user.uri.clone())),
            None => {
                warn!("no user information in execution context");
                report.warnings.push(NO_USER_WARNING.to_string());
            }
        }

        let file_name = normalize_file_name(&self.config.file_name);
        let mut pipeline = RetrievalPipeline::new(
            &self.client,
            self.config.dataset.clone(),
            file_name.as_str(),
            self.options.work_dir.clone(),
        )
        .with_settle(self.options.settle);
        let local = pipeline.run(&self.config.credentials)?;

        let receipt = publish(&self.sink, &sink_id, &local, context.user.as_ref())?;

        report.entity_count = 1;
        report
            .summary
            .push(("Dataset".to_string(), self.config.dataset.to_string()));
        report.summary.push(("File".to_string(), file_name));
        report
            .summary
            .push(("Resource".to_string(), sink_id.to_string()));
        report
            .summary
            .push(("Bytes written".to_string(), receipt.bytes.to_string()));
        channel.update(&report);
        info!(resource = %sink_id, bytes = receipt.bytes, "import finished");
        Ok(report)
    }
}
