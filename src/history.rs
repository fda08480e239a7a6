use std::fs;
use std::fs::OpenOptions;
use std::io::Write;

use camino::Utf8Path;
use chrono::Local;

use crate::domain::ExperimentName;
use crate::error::CalibError;
use crate::store::CalibStore;

/// Append-only deployment log kept next to the constants it covers, one
/// ledger file per canonical directory. An empty file name disables
/// recording entirely.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    file_name: String,
}

impl HistoryLedger {
    pub fn new(file_name: String) -> Self {
        Self { file_name }
    }

    pub fn is_enabled(&self) -> bool {
        !self.file_name.is_empty()
    }

    /// Appends one deploy record to the ledger in the output's directory,
    /// creating the ledger file on first use. Never truncates.
    pub fn record_deploy(
        &self,
        output: &Utf8Path,
        input: &Utf8Path,
        experiment: &ExperimentName,
        run: u32,
        comment: &str,
    ) -> Result<(), CalibError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let name = output
            .file_name()
            .ok_or_else(|| CalibError::Filesystem(format!("invalid output path: {output}")))?;
        let line = deploy_line(
            name,
            input.as_str(),
            experiment.as_str(),
            run,
            comment,
            &Provenance::capture(),
        );
        self.append(&CalibStore::history_dir_of(output), &line)
    }

    /// Appends a removal record, but only when the directory already has a
    /// ledger. Deleting from a never-deployed-to directory leaves no trace.
    pub fn record_delete(&self, deleted: &Utf8Path, comment: &str) -> Result<(), CalibError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let dir = CalibStore::history_dir_of(deleted);
        if !dir.join(&self.file_name).exists() {
            return Ok(());
        }
        let name = deleted
            .file_name()
            .ok_or_else(|| CalibError::Filesystem(format!("invalid path: {deleted}")))?;
        let line = delete_line(name, comment, &Provenance::capture());
        self.append(&dir, &line)
    }

    /// Recorded lines for one canonical directory; empty when the ledger is
    /// disabled or nothing was deployed there yet.
    pub fn read(&self, dir: &Utf8Path) -> Result<Vec<String>, CalibError> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        let path = dir.join(&self.file_name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| CalibError::Filesystem(format!("{path}: {err}")))?;
        Ok(content.lines().map(str::to_string).collect())
    }

    fn append(&self, dir: &Utf8Path, line: &str) -> Result<(), CalibError> {
        let path = dir.join(&self.file_name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_std_path())
            .map_err(|err| CalibError::HistoryAppendFailed {
                path: path.clone(),
                message: err.to_string(),
            })?;
        file.write_all(line.as_bytes())
            .map_err(|err| CalibError::HistoryAppendFailed {
                path,
                message: err.to_string(),
            })
    }
}

/// Who performed the change, where, and when.
struct Provenance {
    user: String,
    host: String,
    stamp: String,
}

impl Provenance {
    fn capture() -> Self {
        Self {
            user: login(),
            host: hostname(),
            stamp: timestamp(),
        }
    }
}

fn deploy_line(
    file_name: &str,
    copy_of: &str,
    experiment: &str,
    run: u32,
    comment: &str,
    who: &Provenance,
) -> String {
    let run = format!("{run:04}");
    format!(
        "file:{file_name:<14}  copy_of:{copy_of}  exp:{experiment:<8}  run:{run:<4}  \
         comment:{comment:<10}  user:{user}  host:{host}  cptime:{stamp:<29}\n",
        user = who.user,
        host = who.host,
        stamp = who.stamp,
    )
}

fn delete_line(file_name: &str, comment: &str, who: &Provenance) -> String {
    let cmd = "rm";
    format!(
        "file:{file_name:<14}  cmd:{cmd:<4}  comment:{comment:<10}  user:{user}  \
         host:{host}  cptime:{stamp:<29}\n",
        user = who.user,
        host = who.host,
        stamp = who.stamp,
    )
}

fn login() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn hostname() -> String {
    if let Ok(host) = std::env::var("HOSTNAME") {
        if !host.is_empty() {
            return host;
        }
    }
    fs::read_to_string("/etc/hostname")
        .map(|content| content.trim().to_string())
        .ok()
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Chrono renders `%Z` for a local time as the numeric UTC offset, so the
/// zone field reads `zone:-07:00` rather than an abbreviation like `PDT`.
fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S  zone:%Z").to_string()
}
