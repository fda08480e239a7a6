use std::fs;

use calib_manager::catalog::DetectorCatalog;
use calib_manager::domain::ExperimentName;
use calib_manager::resolver::resolve_sources;
use calib_manager::scan::{RunScan, ScanLogFile};

#[test]
fn observed_entries_resolve_to_detector_sources() {
    let temp = tempfile::tempdir().unwrap();
    let log = temp.path().join("clb-cxid9114-r0009-peds-scan.txt");
    fs::write(
        &log,
        "run 9 event keys:\n\
         EventKey(type=CsPad::DataV2, src=DetInfo(CxiDs1.0:Cspad.0))\n\
         EventKey(type=CsPad::DataV2, src=DetInfo(CxiDsd.0:Cspad.0))\n\
         EventKey(type=Camera::FrameV1, src=DetInfo(CxiDg2.0:Tm6740.0))\n\
         EventKey(type=Bld::BldDataFEEGasDetEnergy, src=BldInfo(FEEGasDetEnergy))\n",
    )
    .unwrap();

    let template = format!("{}/clb-{{exp}}-r{{run}}-peds-scan.txt", temp.path().display());
    let experiment: ExperimentName = "cxid9114".parse().unwrap();
    let scan = ScanLogFile::new(template, experiment);

    let entries = scan.observed(9).unwrap();
    assert_eq!(entries.len(), 3);

    let catalog = DetectorCatalog::default();
    let resolved = resolve_sources(&catalog, &["CSPAD".to_string()], &entries).unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].source.as_str(), "CxiDs1.0:Cspad.0");
    assert_eq!(resolved[0].calib_type, "CsPad::CalibV1");
    assert_eq!(resolved[1].source.as_str(), "CxiDsd.0:Cspad.0");

    // The camera line resolves only when its detector type is selected.
    let cameras = resolve_sources(&catalog, &["Tm6740".to_string()], &entries).unwrap();
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].detector, "Tm6740");
}

#[test]
fn repeated_event_keys_do_not_duplicate_sources() {
    let temp = tempfile::tempdir().unwrap();
    let log = temp.path().join("scan-0007.txt");
    fs::write(
        &log,
        "EventKey(type=CsPad::DataV2, src=DetInfo(CxiDs1.0:Cspad.0))\n\
         EventKey(type=CsPad::DataV2, src=DetInfo(CxiDs1.0:Cspad.0))\n",
    )
    .unwrap();

    let template = format!("{}/scan-{{run}}.txt", temp.path().display());
    let experiment: ExperimentName = "cxid9114".parse().unwrap();
    let scan = ScanLogFile::new(template, experiment);

    let entries = scan.observed(7).unwrap();
    assert_eq!(entries.len(), 2);

    let catalog = DetectorCatalog::default();
    let resolved = resolve_sources(&catalog, &["CSPAD".to_string()], &entries).unwrap();
    assert_eq!(resolved.len(), 1);
}
