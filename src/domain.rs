use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetSlug {
    owner: String,
    name: String,
}

impl DatasetSlug {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DatasetSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for DatasetSlug {
    type Err = ImportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split('/');
        let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ImportError::InvalidSlug(value.to_string()));
        };
        if owner.is_empty() || name.is_empty() {
            return Err(ImportError::InvalidSlug(value.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

pub fn parse_dataset(identifier: &str) -> Result<DatasetSlug, ImportError> {
    identifier
        .parse()
        .map_err(|_| ImportError::InvalidDataset(identifier.to_string()))
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub key: ApiKey,
}

impl Credentials {
    pub fn new(username: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            key: ApiKey::new(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SinkId {
    project: String,
    resource: String,
}

impl SinkId {
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn qualify(project: &str, sink_name: &str) -> Result<Self, ImportError> {
        if sink_name.contains(':') {
            return sink_name.parse();
        }
        format!("{project}:{sink_name}").parse()
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.resource)
    }
}

impl FromStr for SinkId {
    type Err = ImportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (project, resource) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| ImportError::InvalidSink(value.to_string()))?;
        if !is_plain_segment(project) || !is_plain_segment(resource) {
            return Err(ImportError::InvalidSink(value.to_string()));
        }
        Ok(Self {
            project: project.to_string(),
            resource: resource.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchTermJoin {
    #[default]
    Concatenate,
    Space,
}

impl SearchTermJoin {
    pub fn join(self, terms: &[String]) -> String {
        match self {
            SearchTermJoin::Concatenate => terms.concat(),
            SearchTermJoin::Space => terms.join(" "),
        }
    }
}

fn is_plain_segment(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
}

pub fn contains_space(file_name: &str) -> bool {
    file_name.chars().any(|ch| ch == ' ')
}

pub fn normalize_file_name(file_name: &str) -> String {
    if contains_space(file_name) {
        file_name.replace(' ', "%20")
    } else {
        file_name.to_string()
    }
}

// Kaggle lists nested files as `dir/file`; downloads land flat under the base name.
pub fn file_base_name(file_name: &str) -> &str {
    file_name
        .rsplit_once('/')
        .map_or(file_name, |(_, base)| base)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_slug_valid() {
        let slug: DatasetSlug = "zynicide/wine-reviews".parse().unwrap();
        assert_eq!(slug.owner(), "zynicide");
        assert_eq!(slug.name(), "wine-reviews");
        assert_eq!(slug.to_string(), "zynicide/wine-reviews");
    }

    #[test]
    fn parse_slug_rejects_wrong_separator_count() {
        for value in ["", "wine-reviews", "a/b/c", "/b", "a/", "/"] {
            let err = value.parse::<DatasetSlug>().unwrap_err();
            assert_matches!(err, ImportError::InvalidSlug(_));
        }
    }

    #[test]
    fn parse_dataset_maps_error() {
        let err = parse_dataset("nope").unwrap_err();
        assert_matches!(err, ImportError::InvalidDataset(ref value) if value == "nope");
        assert!(err.to_string().starts_with(
            "Dataset must be specified in the form of '{username}/{dataset-slug}'"
        ));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let creds = Credentials::new("alice", "secret-token");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("secret-token"));
        assert_eq!(creds.key.expose(), "secret-token");
    }

    #[test]
    fn sink_id_qualification() {
        let bare = SinkId::qualify("proj", "out").unwrap();
        assert_eq!(bare.to_string(), "proj:out");

        let qualified = SinkId::qualify("other", "proj:out").unwrap();
        assert_eq!(qualified.project(), "proj");
        assert_eq!(qualified.resource(), "out");

        assert_matches!(SinkId::qualify("", "out"), Err(ImportError::InvalidSink(_)));
        assert_matches!("proj:../x".parse::<SinkId>(), Err(ImportError::InvalidSink(_)));
    }

    #[test]
    fn sink_id_rejects_dot_and_separator_parts() {
        for value in ["..:x", "../../etc:evil", ".:x", "a/b:x", "a\\b:x", "proj:..", "proj:."] {
            assert_matches!(value.parse::<SinkId>(), Err(ImportError::InvalidSink(_)));
        }
        assert_matches!(
            SinkId::qualify("ignored", "..:escaped.csv"),
            Err(ImportError::InvalidSink(_))
        );
        assert_matches!(SinkId::qualify("..", "out"), Err(ImportError::InvalidSink(_)));
        assert!("proj.v2:out..csv".parse::<SinkId>().is_ok());
    }

    #[test]
    fn search_terms_join() {
        let terms = vec!["wine".to_string(), "reviews".to_string()];
        assert_eq!(SearchTermJoin::Concatenate.join(&terms), "winereviews");
        assert_eq!(SearchTermJoin::Space.join(&terms), "wine reviews");
    }

    #[test]
    fn normalize_replaces_every_space() {
        assert_eq!(normalize_file_name("a b c.csv"), "a%20b%20c.csv");
        assert_eq!(normalize_file_name("plain.csv"), "plain.csv");
    }

    #[test]
    fn base_name_drops_directories() {
        assert_eq!(file_base_name("train/data.csv"), "data.csv");
        assert_eq!(file_base_name("a/b/c%20d.csv"), "c%20d.csv");
        assert_eq!(file_base_name("plain.csv"), "plain.csv");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_file_name("a b.csv");
        assert_eq!(once, "a%20b.csv");
        assert_eq!(normalize_file_name(&once), once);
    }
}
