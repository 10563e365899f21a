//! CLI integration tests using assert_cmd.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn lexiloop() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("lexiloop").unwrap()
}

/// A workspace with a config pointing at an offline provider.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = format!(
            r#"
default_provider = "offline"
default_model = "mock-model"
store_path = "{}"

[providers.offline]
type = "mock"
text = "El perro corre en el parque."
"#,
            dir.path().join("store.json").display()
        );
        std::fs::write(dir.path().join("lexiloop.toml"), config).unwrap();
        Self { dir }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("lexiloop.toml")
    }

    fn store(&self) -> PathBuf {
        self.dir.path().join("store.json")
    }

    fn cmd(&self) -> Command {
        let mut cmd = lexiloop();
        cmd.current_dir(self.dir.path())
            .arg("--config")
            .arg(self.config())
            .env_remove("RUST_LOG");
        cmd
    }

    fn add(&self, term: &str, meaning: &str) {
        self.cmd()
            .args(["add", term, meaning])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("Added '{term}'")));
    }

    fn first_queued_id(&self) -> String {
        let output = self.cmd().args(["queue", "--json"]).output().unwrap();
        assert!(output.status.success());
        let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        entries[0]["item"]["id"].as_str().unwrap().to_string()
    }
}

fn read_store(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    lexiloop()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created lexiloop.toml"))
        .stdout(predicate::str::contains("Created ./lexiloop-store.json"));

    assert!(dir.path().join("lexiloop.toml").exists());
    assert!(dir.path().join("lexiloop-store.json").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    lexiloop().current_dir(dir.path()).arg("init").assert().success();

    lexiloop()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn init_uses_store_path_from_existing_config() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("lexiloop.toml already exists"))
        .stdout(predicate::str::contains("store.json"));

    assert!(ws.store().exists());
    assert!(!ws.dir.path().join("lexiloop-store.json").exists());

    ws.add("perro", "dog");
    ws.cmd()
        .arg("queue")
        .assert()
        .success()
        .stdout(predicate::str::contains("perro"));
}

#[test]
fn add_then_queue_lists_new_item() {
    let ws = Workspace::new();
    ws.add("perro", "dog");

    ws.cmd()
        .arg("queue")
        .assert()
        .success()
        .stdout(predicate::str::contains("perro"))
        .stdout(predicate::str::contains("new"))
        .stdout(predicate::str::contains("1 item(s)"));

    let store = read_store(&ws.store());
    assert_eq!(store["items"].as_array().unwrap().len(), 1);
    assert_eq!(store["review_states"].as_array().unwrap().len(), 1);
}

#[test]
fn add_with_deck_creates_it() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["add", "gato", "cat", "--deck", "animals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created deck 'animals'"));

    ws.cmd()
        .args(["queue", "--deck", "animals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gato"));
}

#[test]
fn queue_for_unknown_deck_degrades_to_empty() {
    let ws = Workspace::new();
    ws.add("perro", "dog");

    ws.cmd()
        .args(["queue", "--deck", "missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to review (not_found)."))
        .stdout(predicate::str::contains("perro").not());

    ws.cmd()
        .args(["queue", "--deck", "missing", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn review_updates_state_and_logs_event() {
    let ws = Workspace::new();
    ws.add("perro", "dog");
    let id = ws.first_queued_id();

    ws.cmd()
        .args(["review", id.as_str(), "good"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ease 2.50 -> 2.55"))
        .stdout(predicate::str::contains("3 day(s)"));

    let store = read_store(&ws.store());
    assert_eq!(store["events"].as_array().unwrap().len(), 1);
    assert_eq!(store["review_states"][0]["interval_days"], 3);

    ws.cmd()
        .arg("activity")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 review(s)"));
}

#[test]
fn review_with_unknown_rating_fails() {
    let ws = Workspace::new();
    ws.add("perro", "dog");
    let id = ws.first_queued_id();

    ws.cmd()
        .args(["review", id.as_str(), "easy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("invalid argument"));

    ws.cmd()
        .args(["review", id.as_str(), "easy", "--scheme", "four-level"])
        .assert()
        .success();
}

#[test]
fn review_unknown_item_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["review", "no-such-item", "good"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn preview_shows_every_rating() {
    let ws = Workspace::new();
    ws.add("perro", "dog");
    let id = ws.first_queued_id();

    ws.cmd()
        .args(["preview", id.as_str(), "--scheme", "four-level"])
        .assert()
        .success()
        .stdout(predicate::str::contains("forgot"))
        .stdout(predicate::str::contains("easy"));
}

#[test]
fn daily_is_generated_once_and_saved() {
    let ws = Workspace::new();
    ws.add("perro", "dog");
    ws.add("parque", "park");

    for _ in 0..2 {
        ws.cmd()
            .args(["daily", "--date", "2024-05-01", "--length", "short"])
            .assert()
            .success()
            .stdout(predicate::str::contains("El perro corre en el parque."))
            .stdout(predicate::str::contains("2 target item(s)"));
    }
    let store = read_store(&ws.store());
    assert_eq!(store["artifacts"].as_array().unwrap().len(), 1);
    assert_eq!(store["artifacts"][0]["saved"], false);

    for _ in 0..2 {
        ws.cmd()
            .args(["save-daily", "--date", "2024-05-01"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Saved daily story for 2024-05-01"));
    }
    let store = read_store(&ws.store());
    assert_eq!(store["artifacts"][0]["saved"], true);
}

#[test]
fn daily_without_vocabulary_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["daily", "--date", "2024-05-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no vocabulary"));
}

#[test]
fn save_daily_without_story_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["save-daily", "--date", "2024-05-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn extreme_offsets_are_rejected() {
    let ws = Workspace::new();
    ws.add("perro", "dog");

    for offset in ["-2147483648", "2147483647", "900"] {
        ws.cmd()
            .args(["activity", "--offset-minutes", offset])
            .assert()
            .failure()
            .stderr(predicate::str::contains("utc offset out of range"));
        ws.cmd()
            .args(["daily", "--offset-minutes", offset])
            .assert()
            .failure()
            .stderr(predicate::str::contains("utc offset out of range"));
        ws.cmd()
            .args(["save-daily", "--offset-minutes", offset])
            .assert()
            .failure()
            .stderr(predicate::str::contains("utc offset out of range"));
    }
}

#[test]
fn activity_rejects_bad_month() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["activity", "--year", "2024", "--month", "13"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("month must be 1-12"));
}
