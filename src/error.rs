use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CalibError {
    #[error("unknown detector type: {0}")]
    UnknownDetectorType(String),

    #[error("invalid source identifier: {0}")]
    InvalidSource(String),

    #[error("invalid constant kind: {0}")]
    InvalidConstantKind(String),

    #[error("invalid run range: {0}")]
    InvalidRunRange(String),

    #[error("invalid experiment name: {0}")]
    InvalidExperimentName(String),

    #[error("working file template has no extension to splice against: {0}")]
    MalformedTemplate(String),

    #[error("missing config file calibman.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("required parameter is not set: {0}")]
    MissingParameter(String),

    #[error("invalid file mode, expected octal like \"0664\": {0}")]
    InvalidFileMode(String),

    #[error("input file does not exist: {0}")]
    SourceFileMissing(Utf8PathBuf),

    #[error("failed to create directory {path}: {message}")]
    DirectoryCreateFailed { path: Utf8PathBuf, message: String },

    #[error("failed to copy {input} to {output}: {message}")]
    CopyFailed {
        input: Utf8PathBuf,
        output: Utf8PathBuf,
        message: String,
    },

    #[error("failed to append history record to {path}: {message}")]
    HistoryAppendFailed { path: Utf8PathBuf, message: String },

    #[error("nothing to deploy: the plan contains no operations")]
    NothingToDeploy,

    #[error("invalid file name, expected a bare name: {0}")]
    InvalidFileName(String),

    #[error("calibration file not found: {0}")]
    CalibFileMissing(Utf8PathBuf),

    #[error("refusing to touch the history file itself: {0}")]
    HistoryFileProtected(Utf8PathBuf),

    #[error("run scan failed: {0}")]
    ScanFailed(String),

    #[error("averaging job failed: {0}")]
    JobFailed(String),

    #[error("no averaging job command configured")]
    JobNotConfigured,

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
