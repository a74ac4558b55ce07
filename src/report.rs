use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub region: String,
    pub date: String,
    pub started: String,
    pub finished: String,
    pub stages: Vec<StageReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    pub url: String,
    pub attempts: u32,
    pub extracted_rows: usize,
    pub records: usize,
    pub loaded: usize,
}

impl RunReport {
    /// Rows loaded per stage display name.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.stages
            .iter()
            .map(|s| (s.stage.clone(), s.loaded))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.stages.iter().map(|s| s.loaded).sum()
    }
}
