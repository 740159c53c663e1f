//! CLI end-to-end tests for cs-core.
//!
//! Every test runs the real binary against temp files; stdout must stay
//! parseable in machine formats.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;

fn cs_core() -> Command {
    let mut cmd = cargo_bin_cmd!("cs-core");
    cmd.env_remove("CLAIM_SENTINEL_CONFIG")
        .env_remove("CS_CONFIG_FILE")
        .env_remove("CS_LOG_FORMAT")
        .env("XDG_CONFIG_HOME", "/nonexistent")
        .env("CS_LOG", "off");
    cmd
}

fn scenario_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for (i, billed) in [100.0, 105.0, 98.0, 102.0, 5000.0].iter().enumerate() {
        let row = json!({
            "claim_id": format!("C{}", i + 1),
            "procedure_name": "Blood Test",
            "department": "Cardiology",
            "insurance_provider": "Aetna",
            "provider_id": "DR1234",
            "service_date": "2024-02-10",
            "total_billed_amount": billed,
            "patient_age": 40,
            "length_of_stay": 1,
            "payment_rate": 0.8,
            "claim_status": "Paid",
        });
        writeln!(file, "{}", row).unwrap();
    }
    file
}

fn write_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

mod detect {
    use super::*;

    #[test]
    fn flags_outlier_and_exits_one() {
        let input = scenario_file();
        let output = cs_core()
            .args(["detect", "--methods", "zscore,iqr", "--consensus", "1"])
            .arg(input.path())
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));

        let report = stdout_json(&output);
        assert_eq!(report["metadata"]["claim_count"], 5);
        assert_eq!(report["metadata"]["flagged_count"], 1);
        let claims = report["claims"].as_array().unwrap();
        assert_eq!(claims[4]["claim_id"], "C5");
        assert_eq!(claims[4]["final_anomaly_flag"], true);
        assert_eq!(claims[4]["vote_iqr"], true);
        assert_eq!(claims[0]["claim_status"], "Paid");
        assert!(claims[0].get("vote_lof").is_none());
    }

    #[test]
    fn clean_batch_exits_zero() {
        let rows: Vec<Value> = (0..10)
            .map(|i| {
                json!({
                    "claim_id": format!("C{i}"),
                    "procedure_name": "Blood Test",
                    "department": "Cardiology",
                    "insurance_provider": "Aetna",
                    "provider_id": "DR1234",
                    "service_date": "2024-01-20",
                    "total_billed_amount": 500.0,
                    "patient_age": 30,
                    "length_of_stay": 1,
                    "payment_rate": 0.8,
                })
            })
            .collect();
        let input = write_file(".json", &serde_json::to_string(&rows).unwrap());
        cs_core()
            .args(["detect", "--format", "summary"])
            .arg(input.path())
            .assert()
            .code(0)
            .stdout(predicate::str::contains("claims=10 flagged=0"));
    }

    #[test]
    fn reads_stdin() {
        cs_core()
            .args(["detect", "-", "--methods", "iqr", "--consensus", "1", "-f", "jsonl"])
            .write_stdin(std::fs::read_to_string(scenario_file().path()).unwrap())
            .assert()
            .code(1)
            .stdout(predicate::function(|out: &str| out.lines().count() == 5));
    }

    #[test]
    fn minimal_fields_and_flagged_only() {
        let input = scenario_file();
        let output = cs_core()
            .args([
                "detect",
                "--methods",
                "iqr",
                "--consensus",
                "1",
                "--fields",
                "minimal",
                "--flagged-only",
            ])
            .arg(input.path())
            .output()
            .unwrap();
        let report = stdout_json(&output);
        let claims = report["claims"].as_array().unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].as_object().unwrap().len(), 3);
    }

    #[test]
    fn group_by_adds_summary_tables() {
        let input = scenario_file();
        let output = cs_core()
            .args(["detect", "--methods", "iqr", "--consensus", "1"])
            .args(["-g", "month", "-g", "insurer"])
            .arg(input.path())
            .output()
            .unwrap();
        let report = stdout_json(&output);
        let summaries = report["summaries"].as_array().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0]["group_by"], "month");
        assert_eq!(summaries[0]["rows"][0]["group_key"], "2024-02");
        assert_eq!(summaries[0]["rows"][0]["anomaly_count"], 1);
    }

    #[test]
    fn small_batch_reports_skipped_method() {
        let input = scenario_file();
        let output = cs_core().arg("detect").arg(input.path()).output().unwrap();
        let report = stdout_json(&output);
        let skipped = report["metadata"]["skipped_methods"].as_array().unwrap();
        assert_eq!(skipped[0]["method"], "lof");
        assert_eq!(skipped[0]["reason"], "insufficient_data");
    }

    #[test]
    fn markdown_output() {
        let input = scenario_file();
        cs_core()
            .args(["detect", "--methods", "iqr", "--consensus", "1", "-f", "md"])
            .arg(input.path())
            .assert()
            .code(1)
            .stdout(predicate::str::contains("# Claim anomaly report"))
            .stdout(predicate::str::contains("| C5 |"));
    }

    #[test]
    fn out_file_receives_payload() {
        let input = scenario_file();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.json");
        cs_core()
            .args(["detect", "--methods", "iqr", "--consensus", "1", "-o"])
            .arg(&out)
            .arg(input.path())
            .assert()
            .code(1)
            .stdout(predicate::str::is_empty());
        let report: Value = serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(report["metadata"]["flagged_count"], 1);
    }
}

mod errors {
    use super::*;

    #[test]
    fn missing_column_is_input_error() {
        let input = write_file(
            ".json",
            r#"[{"claim_id": "A", "total_billed_amount": 10,
                 "length_of_stay": 1, "payment_rate": 0.5}]"#,
        );
        let output = cs_core().arg("detect").arg(input.path()).output().unwrap();
        assert_eq!(output.status.code(), Some(12));
        let err = stdout_json(&output);
        assert_eq!(err["code"], 21);
        assert_eq!(err["context"]["column"], "patient_age");
    }

    #[test]
    fn missing_dimension_column_is_input_error() {
        let rows: Vec<Value> = (0..5)
            .map(|i| {
                json!({
                    "claim_id": format!("C{i}"),
                    "total_billed_amount": 100 + i,
                    "patient_age": 30,
                    "length_of_stay": 1,
                    "payment_rate": 0.8,
                })
            })
            .collect();
        let input = write_file(".json", &serde_json::to_string(&rows).unwrap());
        let output = cs_core().arg("detect").arg(input.path()).output().unwrap();
        assert_eq!(output.status.code(), Some(12));
        let err = stdout_json(&output);
        assert_eq!(err["code"], 21);
        assert_eq!(err["context"]["column"], "procedure_name");
    }

    #[test]
    fn malformed_json_is_input_error() {
        let input = write_file(".json", "[{not json");
        cs_core()
            .arg("detect")
            .arg(input.path())
            .assert()
            .code(12);
    }

    #[test]
    fn invalid_threshold_is_config_error() {
        let input = scenario_file();
        cs_core()
            .args(["detect", "--contamination", "0.9"])
            .arg(input.path())
            .assert()
            .code(11);
    }

    #[test]
    fn consensus_above_method_count_is_config_error() {
        let input = scenario_file();
        cs_core()
            .args(["detect", "--methods", "iqr", "--consensus", "2"])
            .arg(input.path())
            .assert()
            .code(11);
    }

    #[test]
    fn unknown_preset_is_args_error() {
        cs_core()
            .args(["config", "show", "--preset", "nope"])
            .assert()
            .code(10);
    }

    #[test]
    fn missing_input_file_is_io_error() {
        cs_core()
            .args(["detect", "/nonexistent/claims.json"])
            .assert()
            .code(21);
    }

    #[test]
    fn human_errors_go_to_stderr() {
        let input = write_file(".json", "[{not json");
        cs_core()
            .args(["detect", "-f", "md", "--no-color"])
            .arg(input.path())
            .assert()
            .code(12)
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains("Reason:"));
    }
}

mod other_commands {
    use super::*;

    #[test]
    fn generate_is_reproducible() {
        let run = || {
            cs_core()
                .args(["generate", "-n", "25", "--seed", "3", "-f", "jsonl"])
                .output()
                .unwrap()
                .stdout
        };
        let first = run();
        assert_eq!(first, run());
        assert_eq!(String::from_utf8(first).unwrap().lines().count(), 25);
    }

    #[test]
    fn generate_then_summarize() {
        let dir = tempfile::tempdir().unwrap();
        let claims = dir.path().join("claims.json");
        cs_core()
            .args(["generate", "-n", "300", "-o"])
            .arg(&claims)
            .assert()
            .success();
        let output = cs_core()
            .args(["summarize", "-g", "procedure", "--top", "3", "--sort", "claim-count"])
            .arg(&claims)
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(0));
        let doc = stdout_json(&output);
        let rows = doc["summaries"][0]["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0]["claim_count"].as_u64() >= rows[1]["claim_count"].as_u64());
    }

    #[test]
    fn check_reports_config_and_input() {
        let input = scenario_file();
        let output = cs_core().arg("check").arg(input.path()).output().unwrap();
        assert_eq!(output.status.code(), Some(0));
        let doc = stdout_json(&output);
        assert_eq!(doc["status"], "ok");
        assert_eq!(doc["checks"][1]["claims"], 5);
    }

    #[test]
    fn config_file_is_used() {
        let input = scenario_file();
        let config = write_file(
            ".toml",
            "methods = [\"iqr\"]\nconsensus_threshold = 1\n",
        );
        let output = cs_core()
            .args(["config", "show", "--config"])
            .arg(config.path())
            .output()
            .unwrap();
        let doc = stdout_json(&output);
        assert_eq!(doc["snapshot"]["source"], "cli");
        assert_eq!(doc["config"]["methods"], json!(["iqr"]));

        cs_core()
            .args(["detect", "--config"])
            .arg(config.path())
            .arg(input.path())
            .assert()
            .code(1);
    }

    #[test]
    fn presets_listed() {
        cs_core()
            .args(["config", "presets", "-f", "md"])
            .assert()
            .success()
            .stdout(predicate::str::contains("strict"))
            .stdout(predicate::str::contains("robust"));
    }

    #[test]
    fn schema_list_and_type() {
        cs_core()
            .args(["schema", "--list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("DetectionReport"));
        let output = cs_core().args(["schema", "SummaryRow"]).output().unwrap();
        let schema = stdout_json(&output);
        assert!(schema["properties"]["anomaly_rate_pct"].is_object());
        cs_core().args(["schema", "Nope"]).assert().code(12);
    }

    #[test]
    fn completions_and_version() {
        cs_core()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cs-core"));
        let output = cs_core().arg("version").output().unwrap();
        assert_eq!(stdout_json(&output)["cs_core_version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn jsonl_logs_stay_on_stderr() {
        let input = scenario_file();
        let output = cs_core()
            .env("CS_LOG", "info")
            .args(["detect", "--log-format", "jsonl", "--methods", "iqr", "--consensus", "1"])
            .arg(input.path())
            .output()
            .unwrap();
        stdout_json(&output);
        let stderr = String::from_utf8(output.stderr).unwrap();
        let events: Vec<Value> = stderr
            .lines()
            .map(|l| serde_json::from_str(l).expect("log line is JSON"))
            .collect();
        assert!(events.iter().any(|e| e["event"] == "run.started"));
        assert!(events.iter().any(|e| e["event"] == "consensus.finished"));
        let run_ids: std::collections::BTreeSet<&str> =
            events.iter().filter_map(|e| e["run_id"].as_str()).collect();
        assert_eq!(run_ids.len(), 1);
    }
}
