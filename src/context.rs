use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub project_id: String,
    pub user: Option<UserIdentity>,
}

impl ExecutionContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            user: None,
        }
    }

    pub fn with_user(mut self, uri: impl Into<String>) -> Self {
        self.user = Some(UserIdentity { uri: uri.into() });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub entity_count: usize,
    pub operation: String,
    pub operation_desc: String,
    pub summary: Vec<(String, String)>,
    pub warnings: Vec<String>,
}

impl Default for ExecutionReport {
    fn default() -> Self {
        Self {
            entity_count: 0,
            operation: "write".to_string(),
            operation_desc: "file written".to_string(),
            summary: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

pub trait ReportChannel {
    fn update(&self, report: &ExecutionReport);
}
