//! Entry point of the crate: drives a station × year matrix through fetching,
//! durable storage and consolidation, resuming whatever an earlier run left behind.

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::fetch::error::FetchError;
use crate::fetch::rate_limiter::RateLimiter;
use crate::fetch::retry::RetryingClient;
use crate::fetch::source::RecordSource;
use crate::planner::ChunkPlanner;
use crate::report::{RunReport, UnitFailure, UnitOutcome, UnitReport};
use crate::storage::atomic::sweep_temp_files;
use crate::storage::consolidator::Consolidator;
use crate::storage::error::StorageError;
use crate::storage::paths::MANIFEST_FILE;
use crate::storage::progress::RunProgress;
use crate::storage::writer::DurableWriter;
use crate::types::chunk::Chunk;
use crate::types::work_unit::WorkUnit;
use crate::utils::{ensure_dir_exists, get_data_dir};
use bon::bon;
use futures_util::{stream, StreamExt, TryStreamExt};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Resumable, rate-limited bulk downloader.
///
/// All state that outlives a run lives under the data root:
/// committed chunk records, yearly archives and the progress manifest. A harvester can
/// therefore be dropped at any point (crash, Ctrl-C) and a new one pointed at the same
/// root continues where the old one stopped, fetching only chunks that were never
/// committed.
///
/// # Examples
///
/// ```no_run
/// # use station_harvest::{AemetSource, Harvester, HarvestError};
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() -> Result<(), HarvestError> {
/// let harvester = Harvester::builder()
///     .source(Arc::new(AemetSource::from_env()?))
///     .build()
///     .await?;
///
/// let report = harvester
///     .run()
///     .stations(vec!["0061X".to_string(), "0076".to_string()])
///     .years(2009..=2023)
///     .call()
///     .await?;
/// println!("{report}");
/// # Ok(())
/// # }
/// ```
pub struct Harvester {
    config: HarvestConfig,
    data_root: PathBuf,
    planner: ChunkPlanner,
    client: RetryingClient,
    writer: DurableWriter,
    consolidator: Consolidator,
}

#[bon]
impl Harvester {
    /// Creates a harvester over `source`.
    ///
    /// # Arguments
    ///
    /// * `.source(Arc<dyn RecordSource>)`: **Required.** Where records are fetched from.
    /// * `.config(HarvestConfig)`: Optional. Defaults to [`HarvestConfig::default()`].
    /// * `.data_root(PathBuf)`: Optional. Defaults to the per-user data directory.
    ///   Created if missing.
    ///
    /// # Errors
    ///
    /// [`HarvestError::InvalidConfig`] if the configuration does not validate,
    /// [`HarvestError::DataDirResolution`] / [`HarvestError::DataDirCreation`] if the data
    /// root cannot be determined or created.
    #[builder]
    pub async fn new(
        source: Arc<dyn RecordSource>,
        config: Option<HarvestConfig>,
        data_root: Option<PathBuf>,
    ) -> Result<Self, HarvestError> {
        let config = config.unwrap_or_default();
        config.validate()?;

        let data_root = match data_root {
            Some(root) => root,
            None => get_data_dir().ok_or(HarvestError::DataDirResolution)?,
        };
        ensure_dir_exists(&data_root)
            .await
            .map_err(|e| HarvestError::DataDirCreation(data_root.clone(), e))?;

        let planner = config.planner();
        let limiter = Arc::new(RateLimiter::new(config.max_requests_per_second));
        let client = RetryingClient::new(source, limiter, config.retry_policy());
        let writer = DurableWriter::new(&data_root);
        let consolidator = Consolidator::new(&data_root, writer.clone(), planner);

        Ok(Self {
            config,
            data_root,
            planner,
            client,
            writer,
            consolidator,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn client(&self) -> &RetryingClient {
        &self.client
    }

    pub fn writer(&self) -> &DurableWriter {
        &self.writer
    }

    pub fn consolidator(&self) -> &Consolidator {
        &self.consolidator
    }

    /// Harvests every `(station, year)` combination of `stations` × `years`.
    ///
    /// Work units are processed by up to `config.workers` concurrent workers, all
    /// sharing one rate limiter. A unit whose chunk cannot be fetched is reported as
    /// failed while the others carry on; each unit whose chunks are all committed is
    /// consolidated into its yearly archive right away.
    ///
    /// When `cancel` fires, no further chunk fetch is started. Commits already under
    /// way are finished, and units that did not complete are reported as
    /// [`UnitFailure::Interrupted`].
    ///
    /// # Errors
    ///
    /// Only storage failures abort the run ([`HarvestError::Storage`]); everything else
    /// ends up in the returned [`RunReport`].
    #[builder]
    pub async fn run(
        &self,
        stations: Vec<String>,
        years: RangeInclusive<i32>,
        cancel: Option<CancellationToken>,
    ) -> Result<RunReport, HarvestError> {
        let cancel = cancel.unwrap_or_default();

        let mut seen = HashSet::new();
        let units: Vec<WorkUnit> = WorkUnit::matrix(&stations, years)
            .into_iter()
            .filter(|unit| {
                let first = seen.insert(unit.clone());
                if !first {
                    warn!("Ignoring duplicate work unit {}", unit);
                }
                first
            })
            .collect();

        self.client.reset_retry_counts();
        self.sweep_interrupted().await?;

        let planned: Vec<Chunk> = units
            .iter()
            .flat_map(|unit| self.planner.plan(&unit.station_id, unit.year))
            .collect();
        let progress = RunProgress::load_or_rebuild(
            &self.data_root.join(MANIFEST_FILE),
            &self.writer,
            &planned,
        )
        .await?;
        info!(
            "Harvesting {} work units ({} chunks, manifest lists {} committed)",
            units.len(),
            planned.len(),
            progress.len()
        );

        let progress = Mutex::new(progress);
        let progress = &progress;
        let cancel = &cancel;
        let mut reports: Vec<(usize, UnitReport)> = stream::iter(units.into_iter().enumerate())
            .map(|(index, unit)| async move {
                self.process_unit(unit, progress, cancel)
                    .await
                    .map(|report| (index, report))
            })
            .buffer_unordered(self.config.workers)
            .try_collect()
            .await?;
        reports.sort_by_key(|(index, _)| *index);

        let report = RunReport {
            units: reports.into_iter().map(|(_, report)| report).collect(),
            min_coverage: self.config.min_coverage,
        };
        info!("{}", report.summary());
        Ok(report)
    }

    async fn process_unit(
        &self,
        unit: WorkUnit,
        progress: &Mutex<RunProgress>,
        cancel: &CancellationToken,
    ) -> Result<UnitReport, HarvestError> {
        let mut report = UnitReport {
            outcome: UnitOutcome::Failed(UnitFailure::Interrupted),
            unit,
            chunks_fetched: 0,
            chunks_resumed: 0,
            retries: 0,
        };
        let chunks = self.planner.plan(&report.unit.station_id, report.unit.year);
        debug!("{}: {} chunks planned", report.unit, chunks.len());

        for chunk in &chunks {
            let key = chunk.key();

            if self.writer.exists(&key).await {
                // Backfill the manifest if the commit landed but its append did not.
                progress.lock().await.record(&key).await?;
                report.chunks_resumed += 1;
                debug!("Chunk {} already committed, skipping", key);
                continue;
            }
            if progress.lock().await.contains(&key) {
                warn!("Manifest lists {} but its record is missing; fetching again", key);
            }

            if cancel.is_cancelled() {
                info!("{}: interrupted before chunk {}", report.unit, key);
                return Ok(report);
            }
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("{}: interrupted while fetching chunk {}", report.unit, key);
                    return Ok(report);
                }
                result = self.client.fetch(chunk) => result,
            };

            let payload = match fetched {
                Ok(fetched) => {
                    report.retries += fetched.retries;
                    if let Err(source) = fetched.payload.validate(&self.config.required_fields) {
                        return Ok(self.fail(report, FetchError::InvalidPayload { key, source }));
                    }
                    fetched.payload
                }
                Err(e) => return Ok(self.fail(report, e)),
            };

            self.writer.commit(&key, &payload).await?;
            progress.lock().await.record(&key).await?;
            report.chunks_fetched += 1;
        }

        let archive = self.consolidator.consolidate(&report.unit).await?;
        if archive.is_below(self.config.min_coverage) {
            warn!(
                "{}: only {:.1}% of days present (threshold {:.1}%)",
                report.unit,
                archive.coverage * 100.0,
                self.config.min_coverage * 100.0
            );
        }
        report.outcome = UnitOutcome::Complete(archive);
        Ok(report)
    }

    /// Removes temporary files left anywhere under the data root by writes that never
    /// reached their rename: chunk records, archives and the rebuilt manifest alike.
    async fn sweep_interrupted(&self) -> Result<usize, HarvestError> {
        let root = self.data_root.clone();
        let removed = tokio::task::spawn_blocking(move || sweep_temp_files(&root))
            .await
            .map_err(StorageError::from)??;
        if removed > 0 {
            info!("Cleaned up {} interrupted writes", removed);
        }
        Ok(removed)
    }

    fn fail(&self, mut report: UnitReport, e: FetchError) -> UnitReport {
        error!("{} failed: {}", report.unit, e);
        report.outcome = UnitOutcome::Failed(UnitFailure::Fetch(e));
        report
    }
}
