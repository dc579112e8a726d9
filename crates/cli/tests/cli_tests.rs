// Integration tests for the spotcheck binary: ingest, lookups, summaries and
// annotations against a throwaway ledger.
//
// Run with: cargo test -p spotcheck-cli --test cli_tests -- --nocapture

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("spotcheck.toml");
        std::fs::write(
            &config,
            "[store]\npath = \"data/ledger.db\"\n\n[query]\ndefault_limit = 50\nignored_statuses = [\"IGNORE_PERMANENTLY\"]\n",
        )
        .unwrap();
        Self { dir, config }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_spotcheck"))
            .env_remove("SPOTCHECK_DB")
            .env_remove("SPOTCHECK_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("run spotcheck")
    }

    fn run_ok(&self, args: &[&str]) -> Output {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "spotcheck {:?} failed: {:?}\nstderr: {}",
            args,
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.run_ok(args);
        serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
            panic!("stdout must be one JSON value: {e}\n{}", String::from_utf8_lossy(&output.stdout))
        })
    }

    fn report(&self, name: &str, body: &str) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn ingest(&self, name: &str, body: &str) -> serde_json::Value {
        let path = self.report(name, body);
        self.json(&["ingest", &path, "--json"])
    }
}

fn daybreak(day: u32, bills: &[&str]) -> String {
    let observations: Vec<String> = bills
        .iter()
        .map(|b| {
            format!(
                r#"{{ "key": {{ "print_no": "{b}", "session_year": 2025 }},
                     "mismatches": [ {{ "mismatch_type": "BILL_TITLE", "reference_data": "ref", "observed_data": "obs" }} ] }}"#
            )
        })
        .collect();
    format!(
        r#"{{ "reference_type": "LBDC_DAYBREAK",
              "report_date_time": "2025-03-{day:02}T10:00:00",
              "reference_date_time": "2025-03-{day:02}T08:00:00",
              "observations": [ {} ] }}"#,
        observations.join(",")
    )
}

fn exit_code(output: &Output) -> Option<i32> {
    output.status.code()
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

#[test]
fn ingest_reports_merge_outcomes() {
    let ws = Workspace::new();

    let first = ws.ingest("day1.json", &daybreak(1, &["S1", "S2"]));
    assert_eq!(first["outcome"], "merged");
    assert_eq!(first["new"], 2);
    assert_eq!(first["report_id"], 1);

    let second = ws.ingest("day2.json", &daybreak(2, &["S2", "S3"]));
    assert_eq!(second["new"], 1);
    assert_eq!(second["existing"], 1);
    assert_eq!(second["resolved"], 1);

    assert!(ws.dir.path().join("data/ledger.db").exists());
}

#[test]
fn ingest_without_observations_is_skipped() {
    let ws = Workspace::new();
    ws.ingest("day1.json", &daybreak(1, &["S1"]));

    let failed = r#"{ "reference_type": "LBDC_DAYBREAK",
                      "report_date_time": "2025-03-02T10:00:00",
                      "reference_date_time": "2025-03-02T08:00:00" }"#;
    let outcome = ws.ingest("failed.json", failed);
    assert_eq!(outcome["outcome"], "skipped");

    let page = ws.json(&["mismatches", "--datasource", "LBDC", "--content-type", "BILL", "--date", "2025-03-02"]);
    assert_eq!(page["total"], 1);
}

#[test]
fn rerunning_a_recorded_report_is_a_no_op() {
    let ws = Workspace::new();
    ws.ingest("day1.json", &daybreak(1, &["S1"]));

    let rerun = daybreak(1, &["S1"]).replacen('{', "{ \"id\": 1,", 1);
    let outcome = ws.ingest("rerun.json", &rerun);
    assert_eq!(outcome["outcome"], "already_merged");
    assert_eq!(outcome["report_id"], 1);
}

#[test]
fn malformed_report_exits_3() {
    let ws = Workspace::new();
    let path = ws.report("bad.json", "{ not json");
    let output = ws.run(&["ingest", &path]);
    assert_eq!(exit_code(&output), Some(3));
    assert!(output.stdout.is_empty());
}

#[test]
fn inapplicable_mismatch_type_exits_4() {
    let ws = Workspace::new();
    let path = ws.report("wrong.json", &daybreak(1, &["S1"]).replace("BILL_TITLE", "CALENDAR_ENTRY_LIST"));
    let output = ws.run(&["ingest", &path]);
    assert_eq!(exit_code(&output), Some(4));
}

#[test]
fn observation_after_report_time_exits_4() {
    let ws = Workspace::new();
    let late = daybreak(1, &["S1"]).replace(
        r#""mismatches": ["#,
        r#""observed_date_time": "2025-03-03T10:00:00", "mismatches": ["#,
    );
    let path = ws.report("late.json", &late);
    let output = ws.run(&["ingest", &path]);
    assert_eq!(exit_code(&output), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("later than the report time"));

    let page = ws.json(&["mismatches", "--datasource", "LBDC", "--content-type", "BILL", "--date", "2025-03-03"]);
    assert_eq!(page["total"], 0);
}

// ---------------------------------------------------------------------------
// lookups
// ---------------------------------------------------------------------------

#[test]
fn mismatches_filter_by_status_and_page() {
    let ws = Workspace::new();
    ws.ingest("day1.json", &daybreak(1, &["S1", "S2", "S3"]));
    ws.ingest("day2.json", &daybreak(2, &["S1", "S4"]));

    let open = ws.json(&[
        "mismatches", "--datasource", "lbdc", "--content-type", "bill", "--date", "2025-03-02", "--limit", "1",
    ]);
    assert_eq!(open["total"], 2);
    assert_eq!(open["results"].as_array().unwrap().len(), 1);

    let resolved = ws.json(&[
        "mismatches", "--datasource", "LBDC", "--content-type", "BILL", "--status", "resolved",
        "--date", "2025-03-02", "--order-by", "id",
    ]);
    let rows = resolved["results"].as_array().unwrap();
    assert_eq!(resolved["total"], 2);
    assert_eq!(rows[0]["key"]["print_no"], "S2");
    assert_eq!(rows[1]["key"]["print_no"], "S3");
    assert_eq!(rows[0]["state"], "RESOLVED");
}

#[test]
fn mismatch_by_id_and_not_found() {
    let ws = Workspace::new();
    ws.ingest("day1.json", &daybreak(1, &["S1"]));

    let row = ws.json(&["mismatch", "1"]);
    assert_eq!(row["mismatch_id"], 1);
    assert_eq!(row["mismatch_type"], "BILL_TITLE");
    assert_eq!(row["first_seen_date_time"], "2025-03-01T10:00:00");

    let output = ws.run(&["mismatch", "99"]);
    assert_eq!(exit_code(&output), Some(11));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("mismatch 99 not found"));
    assert!(stderr.contains("hint:"));
}

#[test]
fn mixed_key_domains_are_a_usage_error() {
    let ws = Workspace::new();
    let output = ws.run(&[
        "mismatches", "--datasource", "LBDC", "--content-type", "BILL", "--content-type", "AGENDA",
    ]);
    assert_eq!(exit_code(&output), Some(2));
}

// ---------------------------------------------------------------------------
// annotations and summaries
// ---------------------------------------------------------------------------

#[test]
fn ignored_rows_drop_out_of_summaries() {
    let ws = Workspace::new();
    ws.ingest("day1.json", &daybreak(1, &["S1", "S2"]));
    ws.run_ok(&["ignore", "1", "ignore_permanently"]);

    let summary = ws.json(&["summary", "status", "--datasource", "LBDC", "--date", "2025-03-01"]);
    assert_eq!(summary["new"], 1);

    let summary = ws.json(&["summary", "status", "--datasource", "LBDC", "--date", "2025-03-01", "--include-ignored"]);
    assert_eq!(summary["new"], 2);

    // Permanent ignore is carried into the next report's row
    ws.ingest("day2.json", &daybreak(2, &["S1", "S2"]));
    let types = ws.json(&[
        "summary", "types", "--datasource", "LBDC", "--content-type", "BILL", "--date", "2025-03-02",
    ]);
    assert_eq!(types["total"], 1);
    assert_eq!(types["counts"]["BILL_TITLE"], 1);
}

#[test]
fn issue_ids_can_be_linked_and_cleared() {
    let ws = Workspace::new();
    ws.ingest("day1.json", &daybreak(1, &["S1"]));

    ws.run_ok(&["issue", "add", "1", "OL-100"]);
    ws.run_ok(&["issue", "add", "1", "OL-200"]);
    ws.run_ok(&["issue", "remove", "1", "OL-100"]);
    assert_eq!(ws.json(&["mismatch", "1"])["issue_ids"], serde_json::json!(["OL-200"]));

    ws.run_ok(&["issue", "add", "1", "OL-300"]);
    ws.run_ok(&["issue", "set", "1", "OL-400"]);
    assert_eq!(ws.json(&["mismatch", "1"])["issue_ids"], serde_json::json!(["OL-400"]));

    ws.run_ok(&["issue", "clear", "1"]);
    assert_eq!(ws.json(&["mismatch", "1"])["issue_ids"], serde_json::json!([]));

    let output = ws.run(&["issue", "add", "1", "   "]);
    assert_eq!(exit_code(&output), Some(2));
}

#[test]
fn content_type_summary_spans_domains() {
    let ws = Workspace::new();
    ws.ingest("bills.json", &daybreak(1, &["S1", "S2"]));
    ws.ingest(
        "calendar.json",
        r#"{ "reference_type": "LBDC_CALENDAR_ALERT",
             "report_date_time": "2025-03-01T11:00:00",
             "reference_date_time": "2025-03-01T11:00:00",
             "observations": [
               { "key": { "year": 2025, "cal_no": 12 },
                 "mismatches": [ { "mismatch_type": "CALENDAR_FLOOR_ENTRY", "reference_data": "a", "observed_data": "b" } ] }
             ] }"#,
    );

    let summary = ws.json(&["summary", "content-types", "--datasource", "LBDC", "--date", "2025-03-01"]);
    assert_eq!(summary["counts"]["BILL"], 2);
    assert_eq!(summary["counts"]["CALENDAR"], 1);

    let calendars = ws.json(&[
        "mismatches", "--datasource", "LBDC", "--content-type", "CALENDAR", "--date", "2025-03-01",
    ]);
    assert_eq!(calendars["results"][0]["key"]["cal_no"], 12);
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn missing_config_file_exits_20() {
    let ws = Workspace::new();
    let output = Command::new(env!("CARGO_BIN_EXE_spotcheck"))
        .env_remove("SPOTCHECK_DB")
        .args(["--config", ws.dir.path().join("nope.toml").to_str().unwrap(), "mismatch", "1"])
        .output()
        .unwrap();
    assert_eq!(exit_code(&output), Some(20));
}

#[test]
fn db_flag_overrides_config_path() {
    let ws = Workspace::new();
    let db = ws.dir.path().join("elsewhere.db");
    let path = ws.report("day1.json", &daybreak(1, &["S1"]));
    ws.run_ok(&["--db", db.to_str().unwrap(), "ingest", &path]);
    assert!(db.exists());
    assert!(!ws.dir.path().join("data/ledger.db").exists());
}
