use std::fs;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::info;

use crate::domain::{ExperimentName, Source};
use crate::error::CalibError;

/// Event-selection parameters handed to the averaging stage.
#[derive(Debug, Clone)]
pub struct EventSelection {
    pub scan_events: u32,
    pub skip_events: u32,
    pub num_events: u32,
    pub event_code: Option<u32>,
    pub threshold_adu_min: f64,
    pub threshold_rms_min: f64,
    pub threshold_rms_max: f64,
}

impl Default for EventSelection {
    fn default() -> Self {
        Self {
            scan_events: 10,
            skip_events: 1,
            num_events: 999,
            event_code: None,
            threshold_adu_min: 0.1,
            threshold_rms_min: 0.1,
            threshold_rms_max: 10000.0,
        }
    }
}

/// Dataset descriptor for one averaging run.
#[derive(Debug, Clone)]
pub struct AveragingRequest {
    pub experiment: ExperimentName,
    pub run: u32,
    pub work_dir: Utf8PathBuf,
    pub file_prefix: String,
    pub sources: Vec<Source>,
    pub events: EventSelection,
}

impl AveragingRequest {
    /// Combined stdout/stderr of the job lands here.
    pub fn log_path(&self) -> Utf8PathBuf {
        self.work_dir.join(format!(
            "{}{}-r{:04}-job-log.txt",
            self.file_prefix, self.experiment, self.run
        ))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub command: String,
    pub exit_code: i32,
    pub log_path: String,
}

/// Collaborator producing the working files (pedestal averages, rms, masks)
/// the planner later picks up. The averaging physics lives behind this seam.
pub trait AveragingJob: Send + Sync {
    fn run(&self, request: &AveragingRequest) -> Result<JobReport, CalibError>;
}

/// Runs a configured shell command template, substituting request fields
/// for `{exp}`, `{run}` (plain), `{run4}` (zero-padded), `{instr}`,
/// `{workdir}`, `{sources}`, `{scan_events}`, `{skip_events}`,
/// `{num_events}`, `{event_code}`, `{thr_adu_min}`, `{thr_rms_min}` and
/// `{thr_rms_max}`. Output is redirected to the per-run job log.
#[derive(Debug, Clone)]
pub struct CommandJob {
    template: String,
    timeout_sec: u64,
}

impl CommandJob {
    pub fn new(template: String, timeout_sec: u64) -> Self {
        Self {
            template,
            timeout_sec,
        }
    }
}

impl AveragingJob for CommandJob {
    fn run(&self, request: &AveragingRequest) -> Result<JobReport, CalibError> {
        if self.template.is_empty() {
            return Err(CalibError::JobNotConfigured);
        }
        let command = substitute_tokens(&self.template, request);
        let log_path = request.log_path();
        let log = fs::File::create(log_path.as_std_path())
            .map_err(|err| CalibError::JobFailed(format!("cannot open {log_path}: {err}")))?;
        let log_err = log
            .try_clone()
            .map_err(|err| CalibError::JobFailed(err.to_string()))?;

        info!("running averaging job: {command}");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|err| CalibError::JobFailed(err.to_string()))?;

        let deadline = Instant::now() + Duration::from_secs(self.timeout_sec);
        let status = loop {
            match child
                .try_wait()
                .map_err(|err| CalibError::JobFailed(err.to_string()))?
            {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    child.kill().ok();
                    child.wait().ok();
                    return Err(CalibError::JobFailed(format!(
                        "job timed out after {}s, log: {log_path}",
                        self.timeout_sec
                    )));
                }
                None => std::thread::sleep(Duration::from_millis(100)),
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        if exit_code != 0 {
            return Err(CalibError::JobFailed(format!(
                "job exited with status {exit_code}, log: {log_path}"
            )));
        }
        Ok(JobReport {
            command,
            exit_code,
            log_path: log_path.to_string(),
        })
    }
}

fn substitute_tokens(template: &str, request: &AveragingRequest) -> String {
    let sources = request
        .sources
        .iter()
        .map(Source::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    let event_code = request
        .events
        .event_code
        .map(|code| code.to_string())
        .unwrap_or_default();
    template
        .replace("{exp}", request.experiment.as_str())
        .replace("{run4}", &format!("{:04}", request.run))
        .replace("{run}", &request.run.to_string())
        .replace("{instr}", &request.experiment.as_str()[..3])
        .replace("{workdir}", request.work_dir.as_str())
        .replace("{sources}", &sources)
        .replace("{scan_events}", &request.events.scan_events.to_string())
        .replace("{skip_events}", &request.events.skip_events.to_string())
        .replace("{num_events}", &request.events.num_events.to_string())
        .replace("{event_code}", &event_code)
        .replace("{thr_adu_min}", &request.events.threshold_adu_min.to_string())
        .replace("{thr_rms_min}", &request.events.threshold_rms_min.to_string())
        .replace("{thr_rms_max}", &request.events.threshold_rms_max.to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn request(work_dir: Utf8PathBuf) -> AveragingRequest {
        AveragingRequest {
            experiment: "cxid9114".parse().unwrap(),
            run: 9,
            work_dir,
            file_prefix: "clb-".to_string(),
            sources: vec!["CxiDs1.0:Cspad.0".parse().unwrap()],
            events: EventSelection::default(),
        }
    }

    #[test]
    fn substitutes_request_fields() {
        let request = request(Utf8PathBuf::from("./work"));
        let command = substitute_tokens(
            "calibrun --exp {exp} -r {run} --instr {instr} -w {workdir} -n {num_events} {sources}",
            &request,
        );
        assert_eq!(
            command,
            "calibrun --exp cxid9114 -r 9 --instr cxi -w ./work -n 999 CxiDs1.0:Cspad.0"
        );
        assert_eq!(substitute_tokens("r{run4}", &request), "r0009");
        assert_eq!(substitute_tokens("[{event_code}]", &request), "[]");
    }

    #[test]
    fn runs_command_and_tees_output() {
        let dir = tempfile::tempdir().unwrap();
        let work = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let job = CommandJob::new("echo exp={exp} run={run4}".to_string(), 30);

        let report = job.run(&request(work)).unwrap();

        assert_eq!(report.exit_code, 0);
        let log = fs::read_to_string(&report.log_path).unwrap();
        assert_eq!(log.trim(), "exp=cxid9114 run=0009");
    }

    #[test]
    fn nonzero_exit_is_a_job_failure() {
        let dir = tempfile::tempdir().unwrap();
        let work = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let job = CommandJob::new("exit 3".to_string(), 30);

        let err = job.run(&request(work)).unwrap_err();
        assert_matches!(err, CalibError::JobFailed(message) if message.contains("status 3"));
    }

    #[test]
    fn empty_template_refuses_to_run() {
        let dir = tempfile::tempdir().unwrap();
        let work = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let job = CommandJob::new(String::new(), 30);

        let err = job.run(&request(work)).unwrap_err();
        assert_matches!(err, CalibError::JobNotConfigured);
    }

    #[test]
    fn slow_job_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let work = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let job = CommandJob::new("sleep 5".to_string(), 1);

        let err = job.run(&request(work)).unwrap_err();
        assert_matches!(err, CalibError::JobFailed(message) if message.contains("timed out"));
    }
}
