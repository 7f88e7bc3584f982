use serde::Serialize;
use tracing::debug;

use crate::domain::{Credentials, DatasetSlug, SearchTermJoin, parse_dataset};
use crate::error::ImportError;
use crate::kaggle::KaggleClient;

pub const SEARCH_PROMPT_VALUE: &str = "Message";
pub const SEARCH_PROMPT_LABEL: &str = "Search for kaggle datasets";
pub const NO_FILES_LABEL: &str = "No files found for this dataset";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Autocompletion {
    pub value: String,
    pub label: String,
}

impl Autocompletion {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

pub trait CompletionSource {
    type Dependencies;

    fn depends_on(&self) -> &'static [&'static str];

    fn resolve_dependencies(&self, values: &[String]) -> Result<Self::Dependencies, ImportError>;

    fn candidates(
        &self,
        query_terms: &[String],
        dependencies: &Self::Dependencies,
    ) -> Result<Vec<Autocompletion>, ImportError>;
}

pub struct DependentAutocompletion<S> {
    source: S,
}

impl<S: CompletionSource> DependentAutocompletion<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn depends_on(&self) -> &'static [&'static str] {
        self.source.depends_on()
    }

    pub fn autocomplete(
        &self,
        query_terms: &[String],
        depend_on_values: &[String],
    ) -> Result<Vec<Autocompletion>, ImportError> {
        let dependencies = self.source.resolve_dependencies(depend_on_values)?;
        let mut result = self.source.candidates(query_terms, &dependencies)?;
        result.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(result)
    }
}

fn dependency(values: &[String], index: usize) -> Option<&str> {
    values
        .get(index)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn credentials_from(values: &[String]) -> Option<Credentials> {
    Some(Credentials::new(dependency(values, 0)?, dependency(values, 1)?))
}

pub struct DatasetSearch<'a, C> {
    client: &'a C,
    join: SearchTermJoin,
}

impl<'a, C: KaggleClient> DatasetSearch<'a, C> {
    pub fn new(client: &'a C, join: SearchTermJoin) -> Self {
        Self { client, join }
    }
}

impl<C: KaggleClient> CompletionSource for DatasetSearch<'_, C> {
    type Dependencies = Credentials;

    fn depends_on(&self) -> &'static [&'static str] {
        &["username", "key"]
    }

    fn resolve_dependencies(&self, values: &[String]) -> Result<Credentials, ImportError> {
        let credentials = credentials_from(values).ok_or_else(|| {
            ImportError::MissingDependency(
                "enter username and api key before searching datasets".to_string(),
            )
        })?;
        self.client.authenticate(&credentials)?;
        Ok(credentials)
    }

    fn candidates(
        &self,
        query_terms: &[String],
        credentials: &Credentials,
    ) -> Result<Vec<Autocompletion>, ImportError> {
        if query_terms.is_empty() {
            return Ok(vec![Autocompletion::new(
                SEARCH_PROMPT_VALUE,
                SEARCH_PROMPT_LABEL,
            )]);
        }
        let term = self.join.join(query_terms);
        let datasets = self.client.search_datasets(credentials, &term)?;
        debug!(term = %term, found = datasets.len(), "dataset search");
        Ok(datasets
            .into_iter()
            .map(|dataset| {
                let slug = dataset.slug.to_string();
                let label = format!("{slug}: {} : {}", dataset.title, dataset.size);
                Autocompletion::new(slug, label)
            })
            .collect())
    }
}

pub struct DatasetFiles<'a, C> {
    client: &'a C,
}

impl<'a, C: KaggleClient> DatasetFiles<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }
}

impl<C: KaggleClient> CompletionSource for DatasetFiles<'_, C> {
    type Dependencies = (Credentials, DatasetSlug);

    fn depends_on(&self) -> &'static [&'static str] {
        &["username", "key", "dataset"]
    }

    fn resolve_dependencies(
        &self,
        values: &[String],
    ) -> Result<(Credentials, DatasetSlug), ImportError> {
        let dataset = dependency(values, 2).ok_or_else(|| {
            ImportError::MissingDependency("select dataset before choosing a file".to_string())
        })?;
        let slug = parse_dataset(dataset)?;
        let credentials = credentials_from(values).ok_or_else(|| {
            ImportError::MissingDependency(
                "enter username and api key before choosing a file".to_string(),
            )
        })?;
        self.client.authenticate(&credentials)?;
        Ok((credentials, slug))
    }

    fn candidates(
        &self,
        _query_terms: &[String],
        (credentials, slug): &(Credentials, DatasetSlug),
    ) -> Result<Vec<Autocompletion>, ImportError> {
        let files = self.client.list_files(credentials, slug)?;
        if files.is_empty() {
            return Ok(vec![Autocompletion::new("", NO_FILES_LABEL)]);
        }
        Ok(files
            .into_iter()
            .map(|name| Autocompletion::new(name.clone(), name))
            .collect())
    }
}
