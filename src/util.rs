use anyhow::{Context, Result};
use std::path::Path;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

fn now_offset() -> OffsetDateTime {
    // now_local() refuses to guess the offset once other threads exist; UTC is the fallback.
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Wall-clock time without offset, matching how `scraped_at` is stored.
pub fn now_local() -> PrimitiveDateTime {
    let now = now_offset();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub fn today() -> Date {
    now_offset().date()
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| "1970-01-01".to_string())
}

pub fn parse_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw.trim(), DATE_FORMAT)
}

pub fn format_timestamp(ts: PrimitiveDateTime) -> String {
    // Drop sub-second precision so SQLite's DATE() sees a plain "YYYY-MM-DD HH:MM:SS".
    let ts = ts.replace_nanosecond(0).unwrap_or(ts);
    ts.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| "1970-01-01 00:00:00".to_string())
}

pub fn parse_timestamp(raw: &str) -> Result<PrimitiveDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(raw.trim(), TIMESTAMP_FORMAT)
}
