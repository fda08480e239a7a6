use std::fs;
use std::io;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{error, info};

use crate::domain::ExperimentName;
use crate::error::CalibError;
use crate::history::HistoryLedger;
use crate::plan::{DeployOperation, DeployPlan};
use crate::store::{CalibStore, set_mode};

/// Experiment, run and audit comment for one deployment.
#[derive(Debug, Clone)]
pub struct DeployContext {
    pub experiment: ExperimentName,
    pub run: u32,
    pub comment: String,
}

/// Copies planned working files into the calibration tree and records each
/// successful copy in the history ledger.
#[derive(Debug, Clone)]
pub struct Deployer {
    ledger: HistoryLedger,
    file_mode: Option<u32>,
    dir_mode: Option<u32>,
}

impl Deployer {
    pub fn new(ledger: HistoryLedger, file_mode: Option<u32>, dir_mode: Option<u32>) -> Self {
        Self {
            ledger,
            file_mode,
            dir_mode,
        }
    }

    /// Performs one copy: verify the input, create the output directory
    /// (new levels get the optional directory mode), stream the bytes,
    /// apply the optional file mode, append one history record. The output
    /// is written through a plain create-and-write; the input's permission
    /// bits are not carried over and there is no temp-file-and-rename step.
    pub fn execute(&self, op: &DeployOperation, ctx: &DeployContext) -> Result<(), CalibError> {
        if !op.input.exists() {
            return Err(CalibError::SourceFileMissing(op.input.clone()));
        }
        let out_dir = op
            .output
            .parent()
            .ok_or_else(|| CalibError::Filesystem(format!("invalid output path: {}", op.output)))?;
        CalibStore::ensure_dir(out_dir, self.dir_mode)?;
        copy_stream(&op.input, &op.output)?;
        if let Some(mode) = self.file_mode {
            set_mode(&op.output, mode)?;
        }
        self.ledger
            .record_deploy(&op.output, &op.input, &ctx.experiment, ctx.run, &ctx.comment)
    }

    /// Runs every selected operation in plan order. A failed operation is
    /// reported and the rest still run; partially deployed state is left in
    /// place.
    pub fn execute_plan(&self, plan: &DeployPlan, ctx: &DeployContext) -> DeployReport {
        let mut report = DeployReport {
            skipped_not_applicable: plan.skipped_not_applicable,
            skipped_missing: plan.skipped_missing,
            ..DeployReport::default()
        };
        for op in &plan.operations {
            if !op.selected {
                report.skipped_unselected += 1;
                continue;
            }
            info!("{}", op.command_line());
            match self.execute(op, ctx) {
                Ok(()) => report.succeeded += 1,
                Err(err) => {
                    error!("deploy failed for {}: {err}", op.output);
                    report.failed.push(FailedOperation {
                        command: op.command_line(),
                        error: err.to_string(),
                    });
                }
            }
        }
        report
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedOperation {
    pub command: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeployReport {
    pub succeeded: u32,
    pub failed: Vec<FailedOperation>,
    pub skipped_unselected: u32,
    pub skipped_not_applicable: u32,
    pub skipped_missing: u32,
}

impl DeployReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

fn copy_stream(input: &Utf8Path, output: &Utf8Path) -> Result<(), CalibError> {
    let mut reader = fs::File::open(input.as_std_path())
        .map_err(|err| copy_failed(input, output, err))?;
    let mut writer = fs::File::create(output.as_std_path())
        .map_err(|err| copy_failed(input, output, err))?;
    io::copy(&mut reader, &mut writer).map_err(|err| copy_failed(input, output, err))?;
    Ok(())
}

fn copy_failed(input: &Utf8Path, output: &Utf8Path, err: io::Error) -> CalibError {
    CalibError::CopyFailed {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;
    use crate::domain::{ConstantKind, ValidityRange};

    fn context() -> DeployContext {
        DeployContext {
            experiment: "cxid9114".parse().unwrap(),
            run: 9,
            comment: "calibrun-dark".to_string(),
        }
    }

    fn operation(root: &Utf8Path, input_name: &str, selected: bool) -> DeployOperation {
        DeployOperation {
            source: "CxiDs1.0:Cspad.0".parse().unwrap(),
            detector: "CSPAD".to_string(),
            calib_type: "CsPad::CalibV1".to_string(),
            kind: ConstantKind::Pedestals,
            input: root.join(input_name),
            output: root
                .join("calib/CsPad::CalibV1/CxiDs1.0:Cspad.0/pedestals")
                .join("9-end.data"),
            range: ValidityRange::open_from(9),
            selected,
        }
    }

    #[test]
    fn deploy_copies_and_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let op = operation(&root, "in.txt", true);
        fs::write(op.input.as_std_path(), b"1.23 4.56\n").unwrap();
        let deployer = Deployer::new(HistoryLedger::new("HISTORY".to_string()), None, None);

        deployer.execute(&op, &context()).unwrap();

        assert_eq!(fs::read(op.output.as_std_path()).unwrap(), b"1.23 4.56\n");
        let history = op.output.parent().unwrap().join("HISTORY");
        let content = fs::read_to_string(history.as_std_path()).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("copy_of:"));
        assert!(content.contains("exp:cxid9114"));
    }

    #[test]
    fn missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let op = operation(&root, "absent.txt", true);
        let deployer = Deployer::new(HistoryLedger::new("HISTORY".to_string()), None, None);

        let err = deployer.execute(&op, &context()).unwrap_err();
        assert_matches!(err, CalibError::SourceFileMissing(_));
        // No history is written for a failed copy.
        assert!(!op.output.parent().unwrap().exists());
    }

    #[test]
    fn plan_execution_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let bad = operation(&root, "absent.txt", true);
        let mut good = operation(&root, "in.txt", true);
        good.output = root.join("calib/CsPad::CalibV1/CxiDs2.0:Cspad.0/pedestals/9-end.data");
        fs::write(good.input.as_std_path(), b"ok\n").unwrap();
        let plan = DeployPlan {
            operations: vec![bad, good.clone(), operation(&root, "in.txt", false)],
            skipped_not_applicable: 0,
            skipped_missing: 2,
        };
        let deployer = Deployer::new(HistoryLedger::new("HISTORY".to_string()), None, None);

        let report = deployer.execute_plan(&plan, &context());

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.skipped_unselected, 1);
        assert_eq!(report.skipped_missing, 2);
        assert!(!report.is_clean());
        assert!(good.output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn applies_configured_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let op = operation(&root, "in.txt", true);
        fs::write(op.input.as_std_path(), b"x\n").unwrap();
        let deployer = Deployer::new(HistoryLedger::new(String::new()), Some(0o644), None);

        deployer.execute(&op, &context()).unwrap();

        let mode = fs::metadata(op.output.as_std_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn applies_configured_dir_mode_to_created_levels() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let op = operation(&root, "in.txt", true);
        fs::write(op.input.as_std_path(), b"x\n").unwrap();
        let deployer = Deployer::new(HistoryLedger::new(String::new()), None, Some(0o2775));

        deployer.execute(&op, &context()).unwrap();

        let mode_of = |path: &Utf8Path| {
            fs::metadata(path.as_std_path()).unwrap().permissions().mode() & 0o7777
        };
        assert_eq!(mode_of(op.output.parent().unwrap()), 0o2775);
        // The whole created chain gets the mode, not just the leaf.
        assert_eq!(mode_of(&root.join("calib")), 0o2775);
    }
}
