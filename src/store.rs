use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{ConstantKind, ExperimentName, Source, ValidityRange};
use crate::error::CalibError;

/// Path layout over the calibration tree and the working directory.
/// Pure path computation except for the directory-creation helpers.
#[derive(Debug, Clone)]
pub struct CalibStore {
    calib_root: Utf8PathBuf,
    work_dir: Utf8PathBuf,
}

impl CalibStore {
    pub fn new(calib_root: Utf8PathBuf, work_dir: Utf8PathBuf) -> Self {
        Self {
            calib_root,
            work_dir,
        }
    }

    /// `<calib_root>/<calib_type>/<source>/<kind>`
    pub fn canonical_dir(
        &self,
        calib_type: &str,
        source: &Source,
        kind: ConstantKind,
    ) -> Utf8PathBuf {
        self.calib_root
            .join(calib_type)
            .join(source.as_str())
            .join(kind.as_str())
    }

    /// `<calib_root>/<calib_type>/<source>/<kind>/<from>-<to>.data`, run
    /// numbers rendered without leading zeros.
    pub fn canonical_path(
        &self,
        calib_type: &str,
        source: &Source,
        kind: ConstantKind,
        range: &ValidityRange,
    ) -> Utf8PathBuf {
        self.canonical_dir(calib_type, source, kind)
            .join(format!("{range}.data"))
    }

    /// Working-file name template for one constant kind, before the source
    /// token is spliced in: `<work_dir>/<prefix><exp>-r<run:04>-<tag>.txt`.
    pub fn working_template(
        &self,
        prefix: &str,
        experiment: &ExperimentName,
        run: u32,
        kind: ConstantKind,
    ) -> Utf8PathBuf {
        self.work_dir.join(format!(
            "{prefix}{experiment}-r{run:04}-{tag}.txt",
            tag = working_tag(kind)
        ))
    }

    /// Splices `-<source>` in front of the template's final extension, e.g.
    /// `clb-cxid9114-r0009-peds-ave.txt` becomes
    /// `clb-cxid9114-r0009-peds-ave-CxiDs1.0:Cspad.0.txt`.
    pub fn working_path(template: &Utf8Path, source: &Source) -> Result<Utf8PathBuf, CalibError> {
        let name = template
            .file_name()
            .ok_or_else(|| CalibError::MalformedTemplate(template.to_string()))?;
        let (stem, ext) = name
            .rsplit_once('.')
            .ok_or_else(|| CalibError::MalformedTemplate(template.to_string()))?;
        Ok(template.with_file_name(format!("{stem}-{source}.{ext}", source = source.as_str())))
    }

    /// Directory whose history ledger covers `path`.
    pub fn history_dir_of(path: &Utf8Path) -> Utf8PathBuf {
        path.parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("."))
    }

    pub fn ensure_work_dir(&self, mode: Option<u32>) -> Result<(), CalibError> {
        Self::ensure_dir(&self.work_dir, mode)
    }

    /// Creates `dir` with any missing parents. Each newly created level gets
    /// `mode`; directories that already exist keep their permissions.
    pub fn ensure_dir(dir: &Utf8Path, mode: Option<u32>) -> Result<(), CalibError> {
        let mut created = Vec::new();
        let mut cursor = dir;
        while !cursor.as_str().is_empty() && !cursor.exists() {
            created.push(cursor.to_path_buf());
            match cursor.parent() {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        fs::create_dir_all(dir.as_std_path()).map_err(|err| CalibError::DirectoryCreateFailed {
            path: dir.to_path_buf(),
            message: err.to_string(),
        })?;
        if let Some(mode) = mode {
            for level in created.iter().rev() {
                set_mode(level, mode)?;
            }
        }
        Ok(())
    }
}

/// Tag used in working-file names produced by the averaging stage.
fn working_tag(kind: ConstantKind) -> &'static str {
    match kind {
        ConstantKind::Pedestals => "peds-ave",
        ConstantKind::PixelRms => "peds-rms",
        ConstantKind::PixelStatus => "hotpix-mask",
        ConstantKind::CommonMode => "peds-cmod",
        other => other.as_str(),
    }
}

#[cfg(unix)]
pub fn set_mode(path: &Utf8Path, mode: u32) -> Result<(), CalibError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path.as_std_path(), fs::Permissions::from_mode(mode))
        .map_err(|err| CalibError::Filesystem(format!("{path}: {err}")))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Utf8Path, _mode: u32) -> Result<(), CalibError> {
    Ok(())
}
