use std::fs;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::DetectorCatalog;
use crate::config::ResolvedConfig;
use crate::deploy::{DeployContext, Deployer, DeployReport};
use crate::domain::{ConstantKind, Source, ValidityRange};
use crate::error::CalibError;
use crate::history::HistoryLedger;
use crate::jobs::{AveragingJob, AveragingRequest};
use crate::plan::{DeployPlan, PlanRequest, build_plan};
use crate::resolver::resolve_sources;
use crate::scan::RunScan;
use crate::store::CalibStore;

#[derive(Debug, Clone, Serialize)]
pub struct SourceRow {
    pub detector: String,
    pub data_type: String,
    pub source: String,
    pub calib_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourcesResult {
    pub run: u32,
    pub sources: Vec<SourceRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub command: String,
    pub exit_code: i32,
    pub log_path: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub run: u32,
    pub range: String,
    pub commands: Vec<String>,
    pub skipped_not_applicable: u32,
    pub skipped_missing: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub deleted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResult {
    pub directory: String,
    pub records: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectorRow {
    pub name: String,
    pub data_type: String,
    pub calib_type: String,
    pub kinds: Vec<String>,
    pub known_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectorsResult {
    pub detectors: Vec<DetectorRow>,
}

/// Capability listing of every supported detector type. Needs no
/// configuration, unlike the run-scoped operations.
pub fn list_detectors(catalog: &DetectorCatalog) -> DetectorsResult {
    DetectorsResult {
        detectors: catalog
            .specs()
            .iter()
            .map(|spec| DetectorRow {
                name: spec.name().to_string(),
                data_type: spec.data_type().to_string(),
                calib_type: spec.calib_type().to_string(),
                kinds: spec.kinds().iter().map(|kind| kind.to_string()).collect(),
                known_sources: spec
                    .known_sources()
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            })
            .collect(),
    }
}

/// Orchestrates one experiment's calibration workflow over the run-scan and
/// averaging-job collaborators.
#[derive(Clone)]
pub struct App<S: RunScan, J: AveragingJob> {
    catalog: DetectorCatalog,
    config: ResolvedConfig,
    scan: S,
    job: J,
}

impl<S: RunScan, J: AveragingJob> App<S, J> {
    pub fn new(catalog: DetectorCatalog, config: ResolvedConfig, scan: S, job: J) -> Self {
        Self {
            catalog,
            config,
            scan,
            job,
        }
    }

    /// Detector sources present in one run, limited to the configured
    /// detector types, or to every known type when none are configured.
    pub fn sources(&self, run: u32) -> Result<SourcesResult, CalibError> {
        let selected = if self.config.detectors.is_empty() {
            self.catalog
                .detector_names()
                .into_iter()
                .map(str::to_string)
                .collect()
        } else {
            self.config.detectors.clone()
        };
        let entries = self.scan.observed(run)?;
        let resolved = resolve_sources(&self.catalog, &selected, &entries)?;
        Ok(SourcesResult {
            run,
            sources: resolved
                .into_iter()
                .map(|r| SourceRow {
                    detector: r.detector,
                    data_type: r.data_type,
                    source: r.source.to_string(),
                    calib_type: r.calib_type,
                })
                .collect(),
        })
    }

    /// Runs the averaging job for one run, producing the working files a
    /// later deploy picks up.
    pub fn process(&self, run: u32) -> Result<ProcessResult, CalibError> {
        if self.config.job_command.is_none() {
            return Err(CalibError::JobNotConfigured);
        }
        CalibStore::ensure_dir(&self.config.work_dir, self.config.dir_mode)?;

        let entries = self.scan.observed(run)?;
        let resolved = resolve_sources(&self.catalog, self.require_detectors()?, &entries)?;
        if resolved.is_empty() {
            warn!("no selected detector sources observed in run {run}");
        }
        let sources: Vec<Source> = resolved.into_iter().map(|r| r.source).collect();

        let request = AveragingRequest {
            experiment: self.config.experiment.clone(),
            run,
            work_dir: self.config.work_dir.clone(),
            file_prefix: self.config.file_prefix.clone(),
            sources: sources.clone(),
            events: self.config.events.clone(),
        };
        let report = self.job.run(&request)?;
        Ok(ProcessResult {
            command: report.command,
            exit_code: report.exit_code,
            log_path: report.log_path,
            sources: sources.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Tentative deployment commands for one run, without touching the
    /// calibration tree. An empty command list here is informational.
    pub fn plan(&self, run: u32, range: Option<ValidityRange>) -> Result<PlanResult, CalibError> {
        let (plan, request) = self.build_run_plan(run, range)?;
        info!("{} tentative deployment commands", plan.operations.len());
        Ok(PlanResult {
            run,
            range: request.range.to_string(),
            commands: plan.command_lines(),
            skipped_not_applicable: plan.skipped_not_applicable,
            skipped_missing: plan.skipped_missing,
        })
    }

    /// Plans and executes a deployment. Refuses an empty plan; a source
    /// selection list narrows execution without replanning.
    pub fn deploy(
        &self,
        run: u32,
        range: Option<ValidityRange>,
        only_sources: &[Source],
        comment: &str,
    ) -> Result<DeployReport, CalibError> {
        let (mut plan, _) = self.build_run_plan(run, range)?;
        if plan.is_empty() {
            return Err(CalibError::NothingToDeploy);
        }
        if !only_sources.is_empty() {
            plan.select_sources(only_sources);
        }
        let deployer = Deployer::new(self.ledger(), self.config.file_mode, self.config.dir_mode);
        let ctx = DeployContext {
            experiment: self.config.experiment.clone(),
            run,
            comment: comment.to_string(),
        };
        let report = deployer.execute_plan(&plan, &ctx);
        info!(
            "deployed {} file(s), {} failed, {} unselected, {} not applicable, {} missing",
            report.succeeded,
            report.failed.len(),
            report.skipped_unselected,
            report.skipped_not_applicable,
            report.skipped_missing
        );
        Ok(report)
    }

    /// Removes one file from the calibration tree and records the removal.
    /// Files are addressed by bare name inside the canonical directory; the
    /// ledger file itself is off limits.
    pub fn delete(
        &self,
        detector: &str,
        source: &Source,
        kind: ConstantKind,
        file_name: &str,
        comment: &str,
    ) -> Result<DeleteResult, CalibError> {
        let store = self.calib_store()?;
        let calib_type = self.catalog.calib_type(detector)?;
        if Utf8Path::new(file_name).file_name() != Some(file_name) {
            return Err(CalibError::InvalidFileName(file_name.to_string()));
        }
        let dir = store.canonical_dir(calib_type, source, kind);
        let path = dir.join(file_name);
        if !self.config.history_file.is_empty() && file_name == self.config.history_file {
            return Err(CalibError::HistoryFileProtected(path));
        }
        if !path.exists() {
            return Err(CalibError::CalibFileMissing(path));
        }
        fs::remove_file(path.as_std_path())
            .map_err(|err| CalibError::Filesystem(format!("{path}: {err}")))?;
        self.ledger().record_delete(&path, comment)?;
        info!("removed {path}");
        Ok(DeleteResult {
            deleted: path.to_string(),
        })
    }

    /// Deployment records for one canonical directory.
    pub fn history(
        &self,
        detector: &str,
        source: &Source,
        kind: ConstantKind,
    ) -> Result<HistoryResult, CalibError> {
        let store = self.calib_store()?;
        let calib_type = self.catalog.calib_type(detector)?;
        let dir = store.canonical_dir(calib_type, source, kind);
        let records = self.ledger().read(&dir)?;
        Ok(HistoryResult {
            directory: dir.to_string(),
            records,
        })
    }

    fn build_run_plan(
        &self,
        run: u32,
        range: Option<ValidityRange>,
    ) -> Result<(DeployPlan, PlanRequest), CalibError> {
        let entries = self.scan.observed(run)?;
        let resolved = resolve_sources(&self.catalog, self.require_detectors()?, &entries)?;
        let store = self.calib_store()?;
        let request = PlanRequest {
            experiment: self.config.experiment.clone(),
            run,
            range: range.unwrap_or_else(|| ValidityRange::open_from(run)),
            file_prefix: self.config.file_prefix.clone(),
        };
        let plan = build_plan(
            &self.catalog,
            &store,
            &resolved,
            &self.config.wanted_kinds(),
            &request,
        )?;
        Ok((plan, request))
    }

    fn calib_store(&self) -> Result<CalibStore, CalibError> {
        Ok(CalibStore::new(
            self.config.calib_dir()?.clone(),
            self.config.work_dir.clone(),
        ))
    }

    fn ledger(&self) -> HistoryLedger {
        HistoryLedger::new(self.config.history_file.clone())
    }

    fn require_detectors(&self) -> Result<&[String], CalibError> {
        if self.config.detectors.is_empty() {
            return Err(CalibError::MissingParameter("detectors".to_string()));
        }
        Ok(&self.config.detectors)
    }
}
