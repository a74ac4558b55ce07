use crate::util::{format_date, today};
use time::Date;

/// `{base}/{stage_path}?wil={region}&view=tabel&tgl_his={date}`; `date` defaults to today.
pub fn build_url(base: &str, stage_path: &str, region: &str, date: Option<Date>) -> String {
    let date = date.unwrap_or_else(today);
    format!(
        "{}/{}?wil={}&view=tabel&tgl_his={}",
        base.trim_end_matches('/'),
        stage_path.trim_start_matches('/'),
        region,
        format_date(date)
    )
}
