//! Turns a scraped progress table into stage-tagged percentage records.

use crate::{config, scrape::RawTable, stage::Stage, util::now_local};
use once_cell::sync::Lazy;
use regex::Regex;
use time::PrimitiveDateTime;
use tracing::{info, warn};

static REGION_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*\)\s*").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Error,
    NotCompleted,
}

impl StatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Error => "Error",
            StatusLabel::NotCompleted => "Not Completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Error" => Some(StatusLabel::Error),
            "Not Completed" => Some(StatusLabel::NotCompleted),
            _ => None,
        }
    }

    /// Label shown on the percentage axis of a dashboard panel.
    pub fn axis_label(&self) -> &'static str {
        match self {
            StatusLabel::Error => "Error (%)",
            StatusLabel::NotCompleted => "Not Completed (%)",
        }
    }
}

/// One persisted row of `progress_data`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub stage: String,
    pub region: String,
    pub status: StatusLabel,
    pub percentage: f64,
    pub recorded_at: PrimitiveDateTime,
}

/// Column positions and marker strings the transform depends on.
#[derive(Debug, Clone)]
pub struct TransformRules {
    pub region_column: usize,
    pub percent_column: usize,
    pub region_marker: String,
    pub error_stage_marker: String,
}

impl Default for TransformRules {
    fn default() -> Self {
        Self::from(&config::Transform::default())
    }
}

impl From<&config::Transform> for TransformRules {
    fn from(cfg: &config::Transform) -> Self {
        Self {
            region_column: cfg.region_column,
            percent_column: cfg.percent_column,
            region_marker: cfg.region_marker.clone(),
            error_stage_marker: cfg.error_stage_marker.clone(),
        }
    }
}

impl TransformRules {
    pub fn status_for(&self, stage_name: &str) -> StatusLabel {
        if stage_name.contains(&self.error_stage_marker) {
            StatusLabel::Error
        } else {
            StatusLabel::NotCompleted
        }
    }
}

pub fn transform(raw: &RawTable, stage: &Stage, rules: &TransformRules) -> Vec<ProgressRecord> {
    transform_at(raw, stage, rules, now_local())
}

/// Same as [`transform`], stamping every record with `recorded_at`.
pub fn transform_at(
    raw: &RawTable,
    stage: &Stage,
    rules: &TransformRules,
    recorded_at: PrimitiveDateTime,
) -> Vec<ProgressRecord> {
    let stage_name = stage.display_name;

    if raw.is_empty() {
        warn!("empty table for {stage_name}, skipping transform");
        return Vec::new();
    }

    let in_region: Vec<&Vec<String>> = raw
        .rows
        .iter()
        .filter(|row| {
            row.get(rules.region_column)
                .is_some_and(|cell| cell.contains(&rules.region_marker))
        })
        .collect();

    if in_region.is_empty() {
        warn!("no rows with '{}' found for {stage_name}", rules.region_marker);
        return Vec::new();
    }

    let status = rules.status_for(stage_name);

    let records: Vec<ProgressRecord> = in_region
        .into_iter()
        .map(|row| {
            let region = clean_region(&row[rules.region_column]);
            let percentage = row
                .get(rules.percent_column)
                .map(|cell| parse_locale_number(cell))
                .unwrap_or(0.0);
            (region, percentage)
        })
        .filter(|(_, percentage)| *percentage > 0.0)
        .map(|(region, percentage)| ProgressRecord {
            stage: stage_name.to_string(),
            region,
            status,
            percentage,
            recorded_at,
        })
        .collect();

    if records.is_empty() {
        info!("all percentages are 0 for {stage_name}, nothing to load");
        return records;
    }

    info!(
        "transformed {} rows for {stage_name} (status: {})",
        records.len(),
        status.as_str()
    );
    records
}

/// `"Kota Tarakan (6571)"` -> `"Kota Tarakan"`.
pub fn clean_region(raw: &str) -> String {
    REGION_CODE.replace_all(raw, "").trim().to_string()
}

/// Parses `1.234,56`-style numbers. Anything unparseable or non-finite is `0`.
pub fn parse_locale_number(raw: &str) -> f64 {
    let normalized = raw.replace('.', "").replace(',', ".");
    match normalized.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}
