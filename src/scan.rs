use std::fs;

use camino::Utf8PathBuf;
use regex::Regex;
use tracing::debug;

use crate::domain::{ExperimentName, Source};
use crate::error::CalibError;

/// One (data-type, source) pair observed in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub data_type: String,
    pub source: Source,
}

/// Run-scan collaborator: reports which detectors produced data in a run.
pub trait RunScan: Send + Sync {
    fn observed(&self, run: u32) -> Result<Vec<ScanEntry>, CalibError>;
}

/// Scan backed by the event-key log the external scanner writes per run,
/// with lines of the form
/// `EventKey(type=CsPad::DataV2, src=DetInfo(CxiDs1.0:Cspad.0))`.
/// Non-matching lines are ignored.
#[derive(Debug, Clone)]
pub struct ScanLogFile {
    template: String,
    experiment: ExperimentName,
}

impl ScanLogFile {
    /// `template` may carry `{exp}` and `{run}` tokens; `{run}` expands to
    /// the zero-padded four-digit run number.
    pub fn new(template: String, experiment: ExperimentName) -> Self {
        Self {
            template,
            experiment,
        }
    }

    pub fn log_path(&self, run: u32) -> Utf8PathBuf {
        Utf8PathBuf::from(
            self.template
                .replace("{exp}", self.experiment.as_str())
                .replace("{run}", &format!("{run:04}")),
        )
    }
}

impl RunScan for ScanLogFile {
    fn observed(&self, run: u32) -> Result<Vec<ScanEntry>, CalibError> {
        let path = self.log_path(run);
        if !path.exists() {
            return Err(CalibError::ScanFailed(format!("scan log not found: {path}")));
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| CalibError::ScanFailed(format!("{path}: {err}")))?;
        Ok(parse_scan_log(&content))
    }
}

pub fn parse_scan_log(content: &str) -> Vec<ScanEntry> {
    let key_re = Regex::new(r"EventKey\(type=([A-Za-z0-9_:]+), src='?DetInfo\(([^)]+)\)'?\)")
        .unwrap();
    let mut entries = Vec::new();
    for line in content.lines() {
        let Some(caps) = key_re.captures(line) else {
            continue;
        };
        let data_type = caps[1].to_string();
        let source = match caps[2].parse::<Source>() {
            Ok(source) => source,
            Err(_) => {
                debug!("skipping event key with unrecognized source: {}", &caps[2]);
                continue;
            }
        };
        entries.push(ScanEntry { data_type, source });
    }
    entries
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const SAMPLE_LOG: &str = "\
run 9 event keys:
EventKey(type=CsPad::DataV2, src=DetInfo(CxiDs1.0:Cspad.0))
EventKey(type=Camera::FrameV1, src=DetInfo(CxiDg2.0:Tm6740.0))
EventKey(type=Bld::BldDataFEEGasDetEnergy, src=BldInfo(FEEGasDetEnergy))
EventKey(type=EvrData::DataV4, src='DetInfo(NoDetector.0:Evr.0)')
not an event key line
";

    #[test]
    fn parses_det_info_keys_only() {
        let entries = parse_scan_log(SAMPLE_LOG);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].data_type, "CsPad::DataV2");
        assert_eq!(entries[0].source.as_str(), "CxiDs1.0:Cspad.0");
        assert_eq!(entries[1].data_type, "Camera::FrameV1");
        assert_eq!(entries[2].source.as_str(), "NoDetector.0:Evr.0");
    }

    #[test]
    fn log_path_substitutes_tokens() {
        let exp: ExperimentName = "cxid9114".parse().unwrap();
        let scan = ScanLogFile::new("./work/clb-{exp}-r{run}-peds-scan.txt".to_string(), exp);
        assert_eq!(
            scan.log_path(9).as_str(),
            "./work/clb-cxid9114-r0009-peds-scan.txt"
        );
    }

    #[test]
    fn missing_log_is_an_error() {
        let exp: ExperimentName = "cxid9114".parse().unwrap();
        let scan = ScanLogFile::new("/no/such/dir/scan-{run}.txt".to_string(), exp);
        let err = scan.observed(9).unwrap_err();
        assert_matches!(err, CalibError::ScanFailed(_));
    }
}
