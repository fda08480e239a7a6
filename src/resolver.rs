use tracing::warn;

use crate::catalog::DetectorCatalog;
use crate::domain::Source;
use crate::error::CalibError;
use crate::scan::ScanEntry;

/// A detector source confirmed present in the scanned run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub detector: String,
    pub data_type: String,
    pub source: Source,
    pub calib_type: String,
}

/// Intersects the selected detector types with the (data-type, source) pairs
/// observed in a run. Selected names are validated up front; a type with no
/// observed sources is tolerated with a warning. Several detector types share
/// one raw data family (`Camera::FrameV` covers Opal, Tm6740, Rayonix, ...),
/// so an entry must also carry the type's name in its source token to count.
pub fn resolve_sources(
    catalog: &DetectorCatalog,
    selected: &[String],
    entries: &[ScanEntry],
) -> Result<Vec<ResolvedSource>, CalibError> {
    let mut resolved: Vec<ResolvedSource> = Vec::new();
    for name in selected {
        let spec = catalog.get(name)?;
        let mut found = false;
        for entry in entries {
            if !entry.data_type.starts_with(spec.data_type()) {
                continue;
            }
            if !entry
                .source
                .detector_token()
                .eq_ignore_ascii_case(spec.name())
            {
                continue;
            }
            if resolved
                .iter()
                .any(|r| r.detector == spec.name() && r.source == entry.source)
            {
                continue;
            }
            resolved.push(ResolvedSource {
                detector: spec.name().to_string(),
                data_type: entry.data_type.clone(),
                source: entry.source.clone(),
                calib_type: spec.calib_type().to_string(),
            });
            found = true;
        }
        if !found {
            warn!("no {} sources observed in the scanned run", spec.name());
        }
    }
    Ok(resolved)
}
