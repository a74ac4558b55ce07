use crate::{
    config::Config,
    error::EtlError,
    report::{RunReport, StageReport},
    retry::RetryPolicy,
    scrape::Extractor,
    stage::{Stage, STAGES},
    store::{self, Store},
    transform::{self, TransformRules},
    url_builder::build_url,
    util::{format_date, format_timestamp, now_local},
};
use time::Date;
use tracing::{debug, info};

/// Runs extract → transform → load for every stage, in declared order.
pub struct Pipeline<X: Extractor, S: Store> {
    cfg: Config,
    extractor: X,
    store: S,
    retry: RetryPolicy,
    rules: TransformRules,
}

impl<X: Extractor, S: Store> Pipeline<X, S> {
    pub fn new(cfg: &Config, extractor: X, store: S) -> Self {
        Self {
            cfg: cfg.clone(),
            extractor,
            store,
            retry: RetryPolicy::from(&cfg.retry),
            rules: TransformRules::from(&cfg.transform),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// The first stage failure that survives extraction retries aborts the run;
    /// stages loaded before it stay loaded.
    pub fn run(&mut self, region: &str, date: Date) -> Result<RunReport, EtlError> {
        let started = format_timestamp(now_local());
        let mut stages = Vec::with_capacity(STAGES.len());

        for stage in STAGES.iter() {
            stages.push(self.run_stage(stage, region, date)?);
        }

        let report = RunReport {
            region: region.to_string(),
            date: format_date(date),
            started,
            finished: format_timestamp(now_local()),
            stages,
        };
        info!("flow complete; total rows loaded: {}", report.total());
        Ok(report)
    }

    fn run_stage(&mut self, stage: &Stage, region: &str, date: Date) -> Result<StageReport, EtlError> {
        let url = build_url(&self.cfg.portal.base_url, stage.path, region, Some(date));

        info!("extracting {} from {}", stage.display_name, url);
        let extractor = &self.extractor;
        let (raw, attempts) = self
            .retry
            .run(stage.display_name, |_| extractor.extract(&url))?;
        info!("extracted {} rows for {}", raw.rows.len(), stage.display_name);

        let records = transform::transform(&raw, stage, &self.rules);
        debug!(stage = stage.id, records = records.len(), "transformed");

        let loaded = store::load(&mut self.store, &records)?;

        Ok(StageReport {
            stage: stage.display_name.to_string(),
            url,
            attempts,
            extracted_rows: raw.rows.len(),
            records: records.len(),
            loaded,
        })
    }
}
