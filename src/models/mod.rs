use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Job record ────────────────────────────────────────────────────────────────

/// One posting recovered from an entry node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRecord {
    pub area: String,             // filled in by the pipeline, never parsed
    pub institute: Option<String>,
    pub status: Option<String>,   // "NEW", "FILLED", ...
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub due: Option<String>,
    pub links: Vec<String>,
}

impl JobRecord {
    /// Records without an institute or a description are unparseable and
    /// never reach the sheet.
    pub fn is_complete(&self) -> bool {
        self.institute.is_some() && self.description.is_some()
    }

    pub fn with_area(mut self, area: &str) -> Self {
        self.area = area.to_string();
        self
    }
}

// ── Area table ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AreaEntry {
    pub code: String,
    pub label: String,
}

impl AreaEntry {
    pub fn new(code: &str, label: &str) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
        }
    }
}
