//! View model behind the monitoring dashboard: per-stage panels, a priority
//! list and per-stage averages, all derived from one day's records.

use crate::{
    stage::STAGES,
    transform::{ProgressRecord, TransformRules},
    util::format_date,
};
use serde::Serialize;
use std::cmp::Ordering;
use time::Date;

pub const GRID_COLUMNS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Critical,
    Warning,
    Clear,
}

impl Severity {
    pub fn of(percentage: f64) -> Self {
        if percentage > 50.0 {
            Severity::Critical
        } else if percentage > 0.0 {
            Severity::Warning
        } else {
            Severity::Clear
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Severity::Critical => "#e74c3c",
            Severity::Warning => "#f1c40f",
            Severity::Clear => "#2ecc71",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Bar {
    pub region: String,
    pub percentage: f64,
    pub severity: Severity,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StagePanel {
    pub stage: String,
    pub row: usize,
    pub col: usize,
    pub status_label: String,
    pub axis_label: String,
    pub empty: bool,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityRow {
    pub stage: String,
    pub region: String,
    pub status: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub stage: String,
    pub average: f64,
    pub regions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub date: Option<String>,
    pub panels: Vec<StagePanel>,
    pub priorities: Vec<PriorityRow>,
    pub summary: Vec<SummaryRow>,
}

impl Dashboard {
    pub fn build(date: Option<Date>, records: &[ProgressRecord], rules: &TransformRules) -> Self {
        let mut panels = Vec::with_capacity(STAGES.len());
        let mut summary = Vec::with_capacity(STAGES.len());

        for (i, stage) in STAGES.iter().enumerate() {
            let mut rows: Vec<&ProgressRecord> = records
                .iter()
                .filter(|r| r.stage == stage.display_name)
                .collect();
            rows.sort_by(|a, b| by_percentage_desc(a.percentage, b.percentage));

            let status = rows
                .first()
                .map(|r| r.status)
                .unwrap_or_else(|| rules.status_for(stage.display_name));
            let axis = rules.status_for(stage.display_name);

            panels.push(StagePanel {
                stage: stage.display_name.to_string(),
                row: i / GRID_COLUMNS + 1,
                col: i % GRID_COLUMNS + 1,
                status_label: status.as_str().to_string(),
                axis_label: axis.axis_label().to_string(),
                empty: rows.is_empty(),
                bars: rows
                    .iter()
                    .map(|r| {
                        let severity = Severity::of(r.percentage);
                        Bar {
                            region: r.region.clone(),
                            percentage: r.percentage,
                            severity,
                            color: severity.color(),
                        }
                    })
                    .collect(),
            });

            summary.push(SummaryRow {
                stage: stage.display_name.to_string(),
                average: average(rows.iter().map(|r| r.percentage)),
                regions: rows.len(),
            });
        }

        let mut priorities: Vec<PriorityRow> = records
            .iter()
            .map(|r| PriorityRow {
                stage: r.stage.clone(),
                region: r.region.clone(),
                status: r.status.as_str().to_string(),
                percentage: r.percentage,
            })
            .collect();
        priorities.sort_by(|a, b| by_percentage_desc(a.percentage, b.percentage));

        Dashboard {
            date: date.map(format_date),
            panels,
            priorities,
            summary,
        }
    }
}

fn by_percentage_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Mean rounded to 2 decimals; 0 for no values.
fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return 0.0;
    }
    ((sum / n as f64) * 100.0).round() / 100.0
}
