use camino::Utf8PathBuf;
use tracing::{info, warn};

use crate::catalog::DetectorCatalog;
use crate::domain::{ConstantKind, ExperimentName, Source, ValidityRange};
use crate::error::CalibError;
use crate::resolver::ResolvedSource;
use crate::store::CalibStore;

/// Deploy sequence. Hot-pixel masks, common mode and geometry ride behind
/// configuration toggles; the order itself is fixed.
pub const DEPLOY_ORDER: [ConstantKind; 5] = [
    ConstantKind::Pedestals,
    ConstantKind::PixelRms,
    ConstantKind::PixelStatus,
    ConstantKind::CommonMode,
    ConstantKind::Geometry,
];

/// One planned copy from a working file into the calibration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOperation {
    pub source: Source,
    pub detector: String,
    pub calib_type: String,
    pub kind: ConstantKind,
    pub input: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub range: ValidityRange,
    pub selected: bool,
}

impl DeployOperation {
    /// Operator-review rendering of the pending copy.
    pub fn command_line(&self) -> String {
        format!("cp {} {}", self.input, self.output)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeployPlan {
    pub operations: Vec<DeployOperation>,
    pub skipped_not_applicable: u32,
    pub skipped_missing: u32,
}

impl DeployPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(DeployOperation::command_line)
            .collect()
    }

    /// Keeps only the listed sources selected for execution. Matching is on
    /// source identity, never on path substrings.
    pub fn select_sources(&mut self, only: &[Source]) {
        for op in &mut self.operations {
            op.selected = only.contains(&op.source);
        }
    }

    pub fn selected_operations(&self) -> impl Iterator<Item = &DeployOperation> {
        self.operations.iter().filter(|op| op.selected)
    }

    pub fn selected_count(&self) -> usize {
        self.selected_operations().count()
    }
}

/// Run, validity range and working-file naming for one planning pass.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub experiment: ExperimentName,
    pub run: u32,
    pub range: ValidityRange,
    pub file_prefix: String,
}

/// Builds the tentative deploy plan for one run: wanted kinds in deploy
/// order, resolved sources in scan order within each kind. Inapplicable
/// (source, kind) pairs and absent working files are skipped and counted;
/// partial coverage is a planning outcome, not an error.
pub fn build_plan(
    catalog: &DetectorCatalog,
    store: &CalibStore,
    resolved: &[ResolvedSource],
    kinds: &[ConstantKind],
    request: &PlanRequest,
) -> Result<DeployPlan, CalibError> {
    let mut plan = DeployPlan::default();
    for kind in DEPLOY_ORDER {
        if !kinds.contains(&kind) {
            continue;
        }
        for r in resolved {
            if !catalog.is_applicable(&r.detector, kind)? {
                info!("skip {kind}: not applicable to {} ({})", r.detector, r.source);
                plan.skipped_not_applicable += 1;
                continue;
            }
            let template = store.working_template(
                &request.file_prefix,
                &request.experiment,
                request.run,
                kind,
            );
            let input = CalibStore::working_path(&template, &r.source)?;
            if !input.exists() {
                warn!("working file not found, skipping: {input}");
                plan.skipped_missing += 1;
                continue;
            }
            let output = store.canonical_path(&r.calib_type, &r.source, kind, &request.range);
            plan.operations.push(DeployOperation {
                source: r.source.clone(),
                detector: r.detector.clone(),
                calib_type: r.calib_type.clone(),
                kind,
                input,
                output,
                range: request.range,
                selected: true,
            });
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;

    use super::*;

    fn resolved(detector: &str, calib_type: &str, source: &str) -> ResolvedSource {
        ResolvedSource {
            detector: detector.to_string(),
            data_type: String::new(),
            source: source.parse().unwrap(),
            calib_type: calib_type.to_string(),
        }
    }

    fn write_working_file(store: &CalibStore, exp: &ExperimentName, run: u32, kind: ConstantKind, source: &Source) {
        let template = store.working_template("clb-", exp, run, kind);
        let path = CalibStore::working_path(&template, source).unwrap();
        fs::write(path.as_std_path(), b"1 2 3\n").unwrap();
    }

    fn test_store(dir: &tempfile::TempDir) -> CalibStore {
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        CalibStore::new(root.join("calib"), root.join("work"))
    }

    fn request(exp: &str, run: u32) -> PlanRequest {
        PlanRequest {
            experiment: exp.parse().unwrap(),
            run,
            range: ValidityRange::open_from(run),
            file_prefix: "clb-".to_string(),
        }
    }

    #[test]
    fn plan_follows_deploy_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        store.ensure_work_dir(None).unwrap();
        let catalog = DetectorCatalog::default();
        let exp: ExperimentName = "cxid9114".parse().unwrap();
        let sources = vec![resolved("CSPAD", "CsPad::CalibV1", "CxiDs1.0:Cspad.0")];
        let source = sources[0].source.clone();
        write_working_file(&store, &exp, 9, ConstantKind::Pedestals, &source);
        write_working_file(&store, &exp, 9, ConstantKind::PixelRms, &source);

        let plan = build_plan(
            &catalog,
            &store,
            &sources,
            &[ConstantKind::PixelRms, ConstantKind::Pedestals],
            &request("cxid9114", 9),
        )
        .unwrap();

        assert_eq!(plan.operations.len(), 2);
        assert_eq!(plan.operations[0].kind, ConstantKind::Pedestals);
        assert_eq!(plan.operations[1].kind, ConstantKind::PixelRms);
        assert!(
            plan.operations[0]
                .output
                .as_str()
                .ends_with("CsPad::CalibV1/CxiDs1.0:Cspad.0/pedestals/9-end.data")
        );
    }

    #[test]
    fn missing_working_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        store.ensure_work_dir(None).unwrap();
        let catalog = DetectorCatalog::default();
        let exp: ExperimentName = "cxid9114".parse().unwrap();
        let sources = vec![resolved("CSPAD", "CsPad::CalibV1", "CxiDs1.0:Cspad.0")];
        write_working_file(&store, &exp, 9, ConstantKind::Pedestals, &sources[0].source);

        let plan = build_plan(
            &catalog,
            &store,
            &sources,
            &[ConstantKind::Pedestals, ConstantKind::PixelRms],
            &request("cxid9114", 9),
        )
        .unwrap();

        assert_eq!(plan.operations.len(), 1);
        assert_eq!(plan.skipped_missing, 1);
        assert_eq!(plan.skipped_not_applicable, 0);
    }

    #[test]
    fn common_mode_gated_by_detector_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        store.ensure_work_dir(None).unwrap();
        let catalog = DetectorCatalog::default();
        let exp: ExperimentName = "sxr61612".parse().unwrap();
        let sources = vec![
            resolved("CSPAD", "CsPad::CalibV1", "CxiDs1.0:Cspad.0"),
            resolved("pnCCD", "PNCCD::CalibV1", "Camp.0:pnCCD.0"),
        ];
        for r in &sources {
            write_working_file(&store, &exp, 21, ConstantKind::CommonMode, &r.source);
        }

        let plan = build_plan(
            &catalog,
            &store,
            &sources,
            &[ConstantKind::CommonMode],
            &request("sxr61612", 21),
        )
        .unwrap();

        assert_eq!(plan.operations.len(), 1);
        assert_eq!(plan.operations[0].detector, "pnCCD");
        assert_eq!(plan.skipped_not_applicable, 1);
    }

    #[test]
    fn selection_filter_matches_source_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        store.ensure_work_dir(None).unwrap();
        let catalog = DetectorCatalog::default();
        let exp: ExperimentName = "cxid9114".parse().unwrap();
        let sources = vec![
            resolved("CSPAD", "CsPad::CalibV1", "CxiDs1.0:Cspad.0"),
            resolved("CSPAD", "CsPad::CalibV1", "CxiDs2.0:Cspad.0"),
        ];
        for r in &sources {
            write_working_file(&store, &exp, 9, ConstantKind::Pedestals, &r.source);
        }

        let mut plan = build_plan(
            &catalog,
            &store,
            &sources,
            &[ConstantKind::Pedestals],
            &request("cxid9114", 9),
        )
        .unwrap();
        assert_eq!(plan.selected_count(), 2);

        plan.select_sources(&["CxiDs2.0:Cspad.0".parse().unwrap()]);
        assert_eq!(plan.selected_count(), 1);
        assert_eq!(
            plan.selected_operations().next().unwrap().source.as_str(),
            "CxiDs2.0:Cspad.0"
        );
    }

    #[test]
    fn command_lines_render_copy_form() {
        let op = DeployOperation {
            source: "CxiDs1.0:Cspad.0".parse().unwrap(),
            detector: "CSPAD".to_string(),
            calib_type: "CsPad::CalibV1".to_string(),
            kind: ConstantKind::Pedestals,
            input: Utf8PathBuf::from("work/clb-cxid9114-r0009-peds-ave-CxiDs1.0:Cspad.0.txt"),
            output: Utf8PathBuf::from("calib/CsPad::CalibV1/CxiDs1.0:Cspad.0/pedestals/9-end.data"),
            range: ValidityRange::open_from(9),
            selected: true,
        };
        assert_eq!(
            op.command_line(),
            "cp work/clb-cxid9114-r0009-peds-ave-CxiDs1.0:Cspad.0.txt \
             calib/CsPad::CalibV1/CxiDs1.0:Cspad.0/pedestals/9-end.data"
        );
    }
}
