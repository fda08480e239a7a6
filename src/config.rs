use std::fs;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::catalog::DetectorCatalog;
use crate::domain::{ConstantKind, ExperimentName};
use crate::error::CalibError;
use crate::jobs::EventSelection;

const DEFAULT_CONFIG_FILE: &str = "calibman.json";
const DEFAULT_WORK_DIR: &str = "./work";
const DEFAULT_FILE_PREFIX: &str = "clb-";
const DEFAULT_HISTORY_FILE: &str = "HISTORY";
const DEFAULT_JOB_TIMEOUT_SEC: u64 = 2000;

/// Raw on-disk configuration. Every field is optional; CLI flags may
/// override any of them before resolution.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub experiment: Option<String>,
    #[serde(default)]
    pub calib_dir: Option<String>,
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default)]
    pub detectors: Vec<String>,
    #[serde(default)]
    pub history_file: Option<String>,
    #[serde(default)]
    pub deploy_hotpix: Option<bool>,
    #[serde(default)]
    pub deploy_cmod: Option<bool>,
    #[serde(default)]
    pub deploy_geometry: Option<bool>,
    #[serde(default)]
    pub file_mode: Option<String>,
    #[serde(default)]
    pub dir_mode: Option<String>,
    #[serde(default)]
    pub scan_log: Option<String>,
    #[serde(default)]
    pub job_command: Option<String>,
    #[serde(default)]
    pub job_timeout_sec: Option<u64>,
    #[serde(default)]
    pub skip_events: Option<u32>,
    #[serde(default)]
    pub num_events: Option<u32>,
    #[serde(default)]
    pub scan_events: Option<u32>,
    #[serde(default)]
    pub event_code: Option<u32>,
    #[serde(default)]
    pub threshold_adu_min: Option<f64>,
    #[serde(default)]
    pub threshold_rms_min: Option<f64>,
    #[serde(default)]
    pub threshold_rms_max: Option<f64>,
}

/// Validated configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub experiment: ExperimentName,
    pub calib_dir: Option<Utf8PathBuf>,
    pub work_dir: Utf8PathBuf,
    pub file_prefix: String,
    pub detectors: Vec<String>,
    pub history_file: String,
    pub deploy_hotpix: bool,
    pub deploy_cmod: bool,
    pub deploy_geometry: bool,
    pub file_mode: Option<u32>,
    pub dir_mode: Option<u32>,
    pub scan_log: Option<String>,
    pub job_command: Option<String>,
    pub job_timeout_sec: u64,
    pub events: EventSelection,
}

impl ResolvedConfig {
    /// Constant kinds wanted for a deploy: pedestals and rms always, the
    /// rest behind their toggles.
    pub fn wanted_kinds(&self) -> Vec<ConstantKind> {
        let mut kinds = vec![ConstantKind::Pedestals, ConstantKind::PixelRms];
        if self.deploy_hotpix {
            kinds.push(ConstantKind::PixelStatus);
        }
        if self.deploy_cmod {
            kinds.push(ConstantKind::CommonMode);
        }
        if self.deploy_geometry {
            kinds.push(ConstantKind::Geometry);
        }
        kinds
    }

    pub fn calib_dir(&self) -> Result<&Utf8PathBuf, CalibError> {
        self.calib_dir
            .as_ref()
            .ok_or_else(|| CalibError::MissingParameter("calib_dir".to_string()))
    }

    /// Scan-log path template; defaults to the scan working file next to
    /// the averaging outputs.
    pub fn scan_log_template(&self) -> String {
        match &self.scan_log {
            Some(template) => template.clone(),
            None => format!(
                "{}/{}{{exp}}-r{{run}}-peds-scan.txt",
                self.work_dir, self.file_prefix
            ),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the raw configuration. An explicit path must be readable; the
    /// default path is required to exist.
    pub fn load(path: Option<&str>) -> Result<Config, CalibError> {
        let config_path = Utf8PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));

        if path.is_none() && !config_path.exists() {
            return Err(CalibError::MissingConfig);
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| CalibError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| CalibError::ConfigParse(err.to_string()))
    }

    pub fn resolve(path: Option<&str>, catalog: &DetectorCatalog) -> Result<ResolvedConfig, CalibError> {
        Self::resolve_config(Self::load(path)?, catalog)
    }

    pub fn resolve_config(
        config: Config,
        catalog: &DetectorCatalog,
    ) -> Result<ResolvedConfig, CalibError> {
        let experiment: ExperimentName = config
            .experiment
            .ok_or_else(|| CalibError::MissingParameter("experiment".to_string()))?
            .parse()?;

        let mut detectors = Vec::new();
        for name in &config.detectors {
            // Canonical catalog spelling, whatever case the config used.
            detectors.push(catalog.get(name)?.name().to_string());
        }

        let file_mode = match &config.file_mode {
            Some(mode) => Some(parse_mode(mode)?),
            None => None,
        };
        let dir_mode = match &config.dir_mode {
            Some(mode) => Some(parse_mode(mode)?),
            None => None,
        };

        let defaults = EventSelection::default();
        Ok(ResolvedConfig {
            experiment,
            calib_dir: config.calib_dir.map(Utf8PathBuf::from),
            work_dir: Utf8PathBuf::from(
                config.work_dir.unwrap_or_else(|| DEFAULT_WORK_DIR.to_string()),
            ),
            file_prefix: config
                .file_prefix
                .unwrap_or_else(|| DEFAULT_FILE_PREFIX.to_string()),
            detectors,
            history_file: config
                .history_file
                .unwrap_or_else(|| DEFAULT_HISTORY_FILE.to_string()),
            deploy_hotpix: config.deploy_hotpix.unwrap_or(false),
            deploy_cmod: config.deploy_cmod.unwrap_or(false),
            deploy_geometry: config.deploy_geometry.unwrap_or(false),
            file_mode,
            dir_mode,
            scan_log: config.scan_log,
            job_command: config.job_command,
            job_timeout_sec: config.job_timeout_sec.unwrap_or(DEFAULT_JOB_TIMEOUT_SEC),
            events: EventSelection {
                scan_events: config.scan_events.unwrap_or(defaults.scan_events),
                skip_events: config.skip_events.unwrap_or(defaults.skip_events),
                num_events: config.num_events.unwrap_or(defaults.num_events),
                event_code: config.event_code,
                threshold_adu_min: config
                    .threshold_adu_min
                    .unwrap_or(defaults.threshold_adu_min),
                threshold_rms_min: config
                    .threshold_rms_min
                    .unwrap_or(defaults.threshold_rms_min),
                threshold_rms_max: config
                    .threshold_rms_max
                    .unwrap_or(defaults.threshold_rms_max),
            },
        })
    }
}

fn parse_mode(mode: &str) -> Result<u32, CalibError> {
    let digits = mode.trim().trim_start_matches("0o");
    let value = u32::from_str_radix(digits, 8)
        .map_err(|_| CalibError::InvalidFileMode(mode.to_string()))?;
    if value > 0o7777 {
        return Err(CalibError::InvalidFileMode(mode.to_string()));
    }
    Ok(value)
}
