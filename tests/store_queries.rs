use susenas_monitor::store::{load, SqliteStore, Store};
use susenas_monitor::transform::{ProgressRecord, StatusLabel};
use time::macros::{date, datetime};
use time::PrimitiveDateTime;

fn rec(stage: &str, region: &str, pct: f64, at: PrimitiveDateTime) -> ProgressRecord {
    ProgressRecord {
        stage: stage.into(),
        region: region.into(),
        status: StatusLabel::NotCompleted,
        percentage: pct,
        recorded_at: at,
    }
}

#[test]
fn load_of_nothing_is_zero() {
    let mut store = SqliteStore::in_memory().unwrap();
    assert_eq!(load(&mut store, &[]).unwrap(), 0);
    assert!(store.read(None).unwrap().is_empty());
    assert!(store.available_dates().unwrap().is_empty());
}

#[test]
fn records_round_trip_through_sqlite() {
    let mut store = SqliteStore::in_memory().unwrap();
    let at = datetime!(2026-10-19 9:15:30);
    let mut error = rec("Pengolahan Dokumen K", "Nunukan", 3.25, at);
    error.status = StatusLabel::Error;
    let batch = vec![rec("Pencacahan", "Kota Tarakan", 12.5, at), error];

    assert_eq!(load(&mut store, &batch).unwrap(), 2);
    assert_eq!(store.read(None).unwrap(), batch);
}

#[test]
fn dates_are_distinct_and_newest_first() {
    let mut store = SqliteStore::in_memory().unwrap();
    load(
        &mut store,
        &[
            rec("Pencacahan", "A", 1.0, datetime!(2026-10-17 23:59:59)),
            rec("Pencacahan", "B", 2.0, datetime!(2026-10-19 0:00:01)),
            rec("Pencacahan", "C", 3.0, datetime!(2026-10-19 14:00)),
            rec("Pencacahan", "D", 4.0, datetime!(2026-10-18 7:00)),
        ],
    )
    .unwrap();

    assert_eq!(
        store.available_dates().unwrap(),
        vec![date!(2026-10-19), date!(2026-10-18), date!(2026-10-17)]
    );

    let day: Vec<String> = store
        .read(Some(date!(2026-10-19)))
        .unwrap()
        .into_iter()
        .map(|r| r.region)
        .collect();
    assert_eq!(day, ["B", "C"]);
    assert_eq!(store.read(None).unwrap().len(), 4);
}

#[test]
fn reruns_append_duplicate_rows() {
    let mut store = SqliteStore::in_memory().unwrap();
    let batch = [rec("Pencacahan", "Kota Tarakan", 12.5, datetime!(2026-10-19 9:00))];
    load(&mut store, &batch).unwrap();
    load(&mut store, &batch).unwrap();
    assert_eq!(store.read(Some(date!(2026-10-19))).unwrap().len(), 2);
    assert_eq!(store.available_dates().unwrap().len(), 1);
}

#[test]
fn file_backed_store_persists_across_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.db");
    {
        let mut store = SqliteStore::open(&path).unwrap();
        load(&mut store, &[rec("Pemutakhiran", "Malinau", 40.0, datetime!(2026-10-19 9:00))]).unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    let rows = store.read(None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].region, "Malinau");
}
