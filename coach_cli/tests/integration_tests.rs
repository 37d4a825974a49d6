//! Integration tests for the coach_cli binary.
//!
//! These tests verify end-to-end behavior including:
//! - Rule listing and lifecycle commands
//! - Due-automation execution and journal rollup
//! - Plan simulation
//! - Preset export/import

use assert_cmd::Command;
use chrono::{Duration, Utc};
use coach_core::{
    engine, executor, preset, AutomationRepository, FileStore, RuleRepository,
};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary
fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("coach"))
}

fn seed_rule(store: &FileStore, name: &str) -> coach_core::Rule {
    engine::create_rule(
        store,
        engine::RuleDraft {
            name: name.into(),
            description: String::new(),
            active: true,
            priority: 5,
            conditions: vec![],
            actions: vec![coach_core::Action {
                target: coach_core::ModificationTarget::Duration,
                op: coach_core::ModificationOp::Increase,
                value: coach_core::Value::Number(10.0),
                limits: None,
            }],
            program_id: None,
            client_id: None,
        },
    )
    .expect("Failed to seed rule")
}

fn seed_due_automation(store: &FileStore, name: &str) -> coach_core::Automation {
    let created = executor::create_automation(
        store,
        executor::AutomationDraft {
            name: name.into(),
            description: String::new(),
            active: true,
            recurrence: coach_core::RecurrenceConfig {
                frequency: coach_core::Frequency::Daily,
                weekday: None,
                day_of_month: None,
                interval_days: None,
                time: Some("08:00".into()),
                start_at: None,
                end_at: None,
            },
            actions: vec![coach_core::AutomationAction {
                verb: coach_core::AutomationVerb::AdjustVolume,
                parameters: Default::default(),
                program_id: None,
                client_id: None,
            }],
            created_by: "tester".into(),
        },
    )
    .expect("Failed to seed automation");

    // Pull the schedule into the past so the automation is due now
    executor::update_automation(store, &created.id, |a| {
        a.next_run = Some(Utc::now() - Duration::hours(1));
    })
    .expect("Failed to backdate automation")
    .expect("Automation vanished")
}

fn plan_json() -> &'static str {
    r#"{
        "monday": {
            "volume": "10",
            "tags": [],
            "sessions": [
                {
                    "id": "m1",
                    "block": "cardio",
                    "duration": "30 min",
                    "intensity": "RPE 6",
                    "modality": "Carrera",
                    "notes": "",
                    "tags": []
                }
            ]
        }
    }"#
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Rule-based training program modification engine",
        ));
}

#[test]
fn test_rules_list_empty() {
    let temp_dir = setup_test_dir();

    cli()
        .args(["rules", "list"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No rules defined."));
}

#[test]
fn test_rules_list_toggle_delete() {
    let temp_dir = setup_test_dir();
    let store = FileStore::new(temp_dir.path());
    let rule = seed_rule(&store, "Descarga semanal");

    cli()
        .args(["rules", "list"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Descarga semanal"));

    cli()
        .args(["rules", "toggle", &rule.id])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("inactive"));

    cli()
        .args(["rules", "delete", &rule.id])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted rule"));

    assert!(store.load_rules().unwrap().is_empty());
}

#[test]
fn test_run_due_executes_and_journals() {
    let temp_dir = setup_test_dir();
    let store = FileStore::new(temp_dir.path());
    seed_due_automation(&store, "Recalcular objetivos");

    cli()
        .args(["automations", "run-due"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Ran 1 automation(s)"));

    let automations = store.load_automations().unwrap();
    assert_eq!(automations[0].total_runs, 1);
    assert!(automations[0].next_run.unwrap() > Utc::now());

    // Run journal was written
    assert!(temp_dir.path().join("automation-runs.jsonl").exists());

    // Nothing due on an immediate re-run
    cli()
        .args(["automations", "run-due"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing due."));
}

#[test]
fn test_manual_run_ignores_schedule() {
    let temp_dir = setup_test_dir();
    let store = FileStore::new(temp_dir.path());
    // Freshly created, so not due until tomorrow
    let automation = seed_due_automation(&store, "manual");
    executor::update_automation(&store, &automation.id, |a| {
        a.next_run = Some(Utc::now() + Duration::days(1));
    })
    .unwrap();

    cli()
        .args(["automations", "run", &automation.id])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Ran automation"));

    let stored = store.load_automations().unwrap();
    assert_eq!(stored[0].total_runs, 1);
}

#[test]
fn test_rollup_archives_journal() {
    let temp_dir = setup_test_dir();
    let store = FileStore::new(temp_dir.path());
    seed_due_automation(&store, "auto");

    cli()
        .args(["automations", "run-due"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success();

    cli()
        .arg("rollup")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--cleanup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled up 1 run record(s)"));

    let csv_path = temp_dir.path().join("automation-runs.csv");
    assert!(csv_path.exists());
    let csv_content = fs::read_to_string(&csv_path).unwrap();
    assert!(csv_content.contains("automation_id"));

    // Cleanup removed the processed journal
    let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".processed"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_empty_rollup() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("rollup")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to roll up"));
}

#[test]
fn test_simulate_reports_deltas() {
    let temp_dir = setup_test_dir();
    let store = FileStore::new(temp_dir.path());
    let rule = seed_rule(&store, "Más volumen");

    let plan_path = temp_dir.path().join("plan.json");
    fs::write(&plan_path, plan_json()).unwrap();

    cli()
        .arg("simulate")
        .arg("--plan")
        .arg(&plan_path)
        .arg("--rules")
        .arg(&rule.id)
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Más volumen - 1 session(s) modified"))
        .stdout(predicate::str::contains("duration: 30 -> 40 min (+10)"));
}

#[test]
fn test_simulate_json_output_parses() {
    let temp_dir = setup_test_dir();
    let store = FileStore::new(temp_dir.path());
    let rule = seed_rule(&store, "json check");

    let plan_path = temp_dir.path().join("plan.json");
    fs::write(&plan_path, plan_json()).unwrap();

    let output = cli()
        .arg("simulate")
        .arg("--plan")
        .arg(&plan_path)
        .arg("--rules")
        .arg(&rule.id)
        .arg("--json")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result: coach_core::SimulationResult =
        serde_json::from_slice(&output).expect("Output was not valid SimulationResult JSON");
    assert_eq!(result.deltas.total_duration, 10.0);
    assert_eq!(result.rules_applied.len(), 1);
}

#[test]
fn test_preset_export_import_roundtrip() {
    let temp_dir = setup_test_dir();
    let store = FileStore::new(temp_dir.path());
    let rule = seed_rule(&store, "incluida");

    let created = preset::create_preset(
        &store,
        preset::PresetDraft {
            name: "Plan base".into(),
            description: String::new(),
            rule_ids: vec![rule.id.clone()],
            automation_ids: vec![],
            tags: vec![],
            category: None,
            public: true,
            created_by: "coach-1".into(),
        },
    )
    .unwrap();

    let export_path = temp_dir.path().join("preset.json");
    cli()
        .args(["presets", "export", &created.id])
        .arg("--output")
        .arg(&export_path)
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported preset"));
    assert!(export_path.exists());

    // Import into a fresh store
    let other_dir = setup_test_dir();
    cli()
        .args(["presets", "import"])
        .arg(&export_path)
        .arg("--user")
        .arg("coach-2")
        .arg("--data-dir")
        .arg(other_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported preset 'Plan base'"));

    let other_store = FileStore::new(other_dir.path());
    let presets = preset::list_presets(&other_store, preset::PresetFilter::All).unwrap();
    assert_eq!(presets.len(), 1);
    assert!(!presets[0].public);
    assert_eq!(presets[0].created_by, "coach-2");
    assert_eq!(other_store.load_rules().unwrap().len(), 1);
}

#[test]
fn test_presets_list_filters() {
    let temp_dir = setup_test_dir();
    let store = FileStore::new(temp_dir.path());
    preset::create_preset(
        &store,
        preset::PresetDraft {
            name: "mío".into(),
            description: String::new(),
            rule_ids: vec![],
            automation_ids: vec![],
            tags: vec![],
            category: None,
            public: false,
            created_by: "coach-1".into(),
        },
    )
    .unwrap();

    cli()
        .args(["presets", "list", "--filter", "mine", "--user", "coach-1"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("mío"));

    cli()
        .args(["presets", "list", "--filter", "public"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No presets."));

    // mine without --user is an error
    cli()
        .args(["presets", "list", "--filter", "mine"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--user is required"));
}
