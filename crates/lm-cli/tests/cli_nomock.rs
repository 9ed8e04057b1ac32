//! End-to-end tests for the logmask binary.
//!
//! Every invocation runs with its config and home directories pointed at a
//! temp dir so no user settings leak in.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn logmask(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("logmask").expect("logmask binary should exist");
    cmd.env_remove("LOGMASK_CONFIG")
        .env_remove("LOGMASK_LOG")
        .env_remove("LOGMASK_LOG_FORMAT")
        .env_remove("RUST_LOG")
        .env("LOGMASK_CONFIG_DIR", home.join("cfg"))
        .env("XDG_CONFIG_HOME", home.join("xdg"))
        .env("HOME", home);
    cmd
}

mod scrub {
    use super::*;

    #[test]
    fn masks_stdin_line_by_line() {
        let home = TempDir::new().unwrap();
        let output = logmask(home.path())
            .arg("scrub")
            .write_stdin("login ok password=hunter2\nplain line\nlast token=abcdef")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("password=***"));
        assert!(text.contains("plain line\n"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("abcdef"));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn custom_mask_flag() {
        let home = TempDir::new().unwrap();
        logmask(home.path())
            .args(["scrub", "--mask", "[X]"])
            .write_stdin("password=secret123\r\n")
            .assert()
            .success()
            .stdout("password=[X]\r\n");
    }
}

mod mask {
    use super::*;

    #[test]
    fn masks_file_next_to_input() {
        let home = TempDir::new().unwrap();
        let input = home.path().join("app.log");
        fs::write(&input, "user=bob password=secret123\nhello\n").unwrap();

        logmask(home.path())
            .args(["mask", "--lf"])
            .arg(&input)
            .assert()
            .code(0)
            .stdout(predicate::str::contains(
                "Processed 1 file(s): 1 succeeded, 0 failed, 0 cancelled",
            ));

        let masked = fs::read_to_string(home.path().join("app.log.masked.log")).unwrap();
        assert_eq!(masked, "user=bob password=***\nhello\n");
        assert_eq!(
            fs::read_to_string(&input).unwrap(),
            "user=bob password=secret123\nhello\n"
        );
    }

    #[test]
    fn json_format_and_output_dir() {
        let home = TempDir::new().unwrap();
        let input = home.path().join("a.log");
        fs::write(&input, "token=abc\n").unwrap();
        let out_dir = home.path().join("out");

        let output = logmask(home.path())
            .args(["mask", "--lf", "--format", "json", "--suffix", ".clean"])
            .arg("--output-dir")
            .arg(&out_dir)
            .arg(&input)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let doc: Value = serde_json::from_slice(&output).unwrap();
        assert!(doc["jobId"].is_string());
        assert_eq!(doc["summary"]["totalFiles"], 1);
        assert_eq!(doc["results"][0]["success"], true);
        assert!(out_dir.join("a.log.clean").exists());
    }

    #[test]
    fn missing_file_is_partial_failure() {
        let home = TempDir::new().unwrap();
        let good = home.path().join("good.log");
        fs::write(&good, "fine\n").unwrap();

        logmask(home.path())
            .arg("mask")
            .arg(&good)
            .arg(home.path().join("missing.log"))
            .assert()
            .code(3)
            .stdout(predicate::str::contains("Failed files:"));
        assert!(home.path().join("good.log.masked.log").exists());
    }

    #[test]
    fn zero_concurrency_is_args_error() {
        let home = TempDir::new().unwrap();
        let input = home.path().join("a.log");
        fs::write(&input, "x\n").unwrap();

        logmask(home.path())
            .args(["mask", "--concurrency", "0"])
            .arg(&input)
            .assert()
            .code(10)
            .stderr(predicate::str::contains("concurrency"));
        assert!(!home.path().join("a.log.masked.log").exists());
    }

    #[test]
    fn events_stream_to_stderr() {
        let home = TempDir::new().unwrap();
        let input = home.path().join("a.log");
        fs::write(&input, "x\n").unwrap();

        let output = logmask(home.path())
            .args(["--log-level", "off", "mask", "--events"])
            .arg(&input)
            .assert()
            .success()
            .get_output()
            .stderr
            .clone();
        let events: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.first().unwrap()["event"], "batch_started");
        assert_eq!(events.last().unwrap()["event"], "batch_finished");
    }
}

mod args {
    use super::*;

    #[test]
    fn unknown_flag_is_args_error() {
        let home = TempDir::new().unwrap();
        logmask(home.path())
            .args(["mask", "--no-such-flag", "a.log"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn help_exits_clean() {
        let home = TempDir::new().unwrap();
        logmask(home.path())
            .arg("--help")
            .assert()
            .code(0)
            .stdout(predicate::str::contains("mask"));
    }
}

mod patterns {
    use super::*;

    #[test]
    fn lists_catalog_as_json() {
        let home = TempDir::new().unwrap();
        let output = logmask(home.path())
            .args(["patterns", "--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let doc: Value = serde_json::from_slice(&output).unwrap();
        let names: Vec<&str> = doc["patterns"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|p| p["name"].as_str())
            .collect();
        assert!(names.contains(&"email"));
        assert!(doc["sensitiveKeys"]
            .as_array()
            .unwrap()
            .iter()
            .any(|k| k == "password"));
    }

    #[test]
    fn toggled_rule_shows_disabled() {
        let home = TempDir::new().unwrap();
        let settings = home.path().join("s.json");
        fs::write(&settings, r#"{"scrubberOptions": {"patternToggles": {"email": false}}}"#)
            .unwrap();
        let output = logmask(home.path())
            .arg("--config")
            .arg(&settings)
            .args(["patterns", "--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let doc: Value = serde_json::from_slice(&output).unwrap();
        let email = doc["patterns"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == "email")
            .unwrap();
        assert_eq!(email["enabled"], false);
    }
}

mod config {
    use super::*;

    #[test]
    fn init_refuses_overwrite_without_force() {
        let home = TempDir::new().unwrap();
        let expected = home.path().join("cfg").join("settings.json");

        logmask(home.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("settings.json"));
        assert!(expected.exists());

        logmask(home.path())
            .args(["config", "init"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("--force"));

        logmask(home.path())
            .args(["config", "init", "--force"])
            .assert()
            .success();

        logmask(home.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("settings.json"));
    }

    #[test]
    fn show_reflects_config_file() {
        let home = TempDir::new().unwrap();
        let settings = home.path().join("custom.json");
        fs::write(&settings, r#"{"concurrency": 7, "bogus": 1}"#).unwrap();

        let output = logmask(home.path())
            .arg("--config")
            .arg(&settings)
            .args(["config", "show"])
            .assert()
            .success()
            .stderr(predicate::str::contains("bogus"))
            .get_output()
            .stdout
            .clone();
        let doc: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(doc["schemaVersion"], "1.0.0");
        assert_eq!(doc["concurrency"], 7);
    }

    #[test]
    fn missing_explicit_config_is_args_error() {
        let home = TempDir::new().unwrap();
        logmask(home.path())
            .arg("--config")
            .arg(home.path().join("nope.json"))
            .args(["config", "show"])
            .assert()
            .code(10);
    }

    #[test]
    fn path_without_settings_prints_none() {
        let home = TempDir::new().unwrap();
        logmask(home.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout("none\n");
    }
}
