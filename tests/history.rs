use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use calib_manager::domain::ExperimentName;
use calib_manager::history::HistoryLedger;

fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

#[test]
fn deploy_records_round_trip() {
    let temp = tempfile::tempdir().unwrap();
    let dir = utf8(temp.path()).join("pedestals");
    fs::create_dir_all(dir.as_std_path()).unwrap();
    let output = dir.join("9-end.data");
    let input = Utf8PathBuf::from("./work/clb-cxid9114-r0009-peds-ave-CxiDs1.0:Cspad.0.txt");
    let experiment: ExperimentName = "cxid9114".parse().unwrap();

    let ledger = HistoryLedger::new("HISTORY".to_string());
    ledger
        .record_deploy(&output, &input, &experiment, 9, "calibrun-dark")
        .unwrap();
    ledger
        .record_deploy(&output, &input, &experiment, 9, "calibrun-dark")
        .unwrap();

    let records = ledger.read(&dir).unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record.starts_with("file:9-end.data"));
        assert!(record.contains("exp:cxid9114"));
        assert!(record.contains("run:0009"));
        assert!(record.contains("user:"));
        assert!(record.contains("cptime:"));
    }
}

#[test]
fn reading_without_a_ledger_file_is_empty() {
    let temp = tempfile::tempdir().unwrap();
    let dir = utf8(temp.path());

    let ledger = HistoryLedger::new("HISTORY".to_string());
    assert!(ledger.read(&dir).unwrap().is_empty());

    let disabled = HistoryLedger::new(String::new());
    assert!(!disabled.is_enabled());
    assert!(disabled.read(&dir).unwrap().is_empty());
}

#[test]
fn delete_is_recorded_only_next_to_an_existing_ledger() {
    let temp = tempfile::tempdir().unwrap();
    let dir = utf8(temp.path()).join("pedestals");
    fs::create_dir_all(dir.as_std_path()).unwrap();
    let deleted = dir.join("9-end.data");

    let ledger = HistoryLedger::new("HISTORY".to_string());

    // No ledger file in the directory yet, so nothing is written.
    ledger.record_delete(&deleted, "cleanup").unwrap();
    assert!(!dir.join("HISTORY").exists());

    fs::write(dir.join("HISTORY").as_std_path(), "").unwrap();
    ledger.record_delete(&deleted, "cleanup").unwrap();

    let records = ledger.read(&dir).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].contains("cmd:rm"));
    assert!(records[0].contains("comment:cleanup"));
}

#[test]
fn ledger_lives_beside_the_deployed_file() {
    let temp = tempfile::tempdir().unwrap();
    let dir = utf8(temp.path());
    let output = dir.join("common_mode").join("9-end.data");
    fs::create_dir_all(output.parent().unwrap().as_std_path()).unwrap();
    let experiment: ExperimentName = "cxid9114".parse().unwrap();

    let ledger = HistoryLedger::new("HISTORY".to_string());
    ledger
        .record_deploy(
            &output,
            Utf8Path::new("./work/input.txt"),
            &experiment,
            9,
            "calibrun-dark",
        )
        .unwrap();

    assert!(dir.join("common_mode").join("HISTORY").exists());
}
