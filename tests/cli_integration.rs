//! Integration tests for the docmigrate binary.
//!
//! Each test runs the binary inside a scratch project directory with its
//! own HOME so user-level configuration never leaks in.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use docmigrate::core::types::Fingerprint;

// =============================================================================
// Test Fixtures
// =============================================================================

struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, name: &str, contents: &str) {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("docmigrate").unwrap();
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".xdg"))
            .env_remove("DOCMIGRATE_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }
}

/// Canonical shape of `app::Person` in [`catalog`].
const PERSON_SHAPE: &str = "String-Name|u8-Age";

fn catalog(baseline: Option<&str>) -> String {
    let baseline = baseline
        .map(|b| format!("baseline = \"{b}\"\n"))
        .unwrap_or_default();
    format!(
        r#"
[[types]]
name = "app::Person"
members = [
    {{ name = "Name", type = "String" }},
    {{ name = "Age", type = "u8" }},
]
methods = [
    {{ name = "migrate_1", params = ["object", "context"], returns = "object" }},
    {{ name = "migrate_2", params = ["object", "context"], returns = "object" }},
]

[types.migration]
{baseline}
[[types]]
name = "app::Plain"
members = [{{ name = "Id", type = "u64" }}]
"#
    )
}

fn person_fingerprint() -> String {
    Fingerprint::compute(PERSON_SHAPE).to_string()
}

// =============================================================================
// shape / hash
// =============================================================================

#[test]
fn shape_prints_canonical_members() {
    let project = Project::new();
    project.write("catalog.toml", &catalog(None));

    project
        .cmd()
        .args(["--catalog", "catalog.toml", "shape", "app::Person"])
        .assert()
        .success()
        .stdout(format!("{PERSON_SHAPE}\n"));
}

#[test]
fn hash_prints_fingerprint() {
    let project = Project::new();
    project.write("catalog.toml", &catalog(None));

    project
        .cmd()
        .args(["--catalog", "catalog.toml", "hash", "app::Person"])
        .assert()
        .success()
        .stdout(format!("{}\n", person_fingerprint()));
}

#[test]
fn missing_catalog_is_reported() {
    let project = Project::new();
    project
        .cmd()
        .args(["hash", "app::Person"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no catalogs configured"));
}

// =============================================================================
// check / chain
// =============================================================================

#[test]
fn check_passes_with_recorded_baseline() {
    let project = Project::new();
    project.write("catalog.toml", &catalog(Some(&person_fingerprint())));

    project
        .cmd()
        .args(["--catalog", "catalog.toml", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok    app::Person v2"));
}

#[test]
fn check_reports_drift_and_fails() {
    let project = Project::new();
    project.write("catalog.toml", &catalog(None));

    project
        .cmd()
        .args(["--catalog", "catalog.toml", "check", "app::Person", "app::Plain"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL  app::Person"))
        .stdout(predicate::str::contains(person_fingerprint()))
        .stdout(predicate::str::contains("migrate_3"))
        .stdout(predicate::str::contains("skip  app::Plain"))
        .stderr(predicate::str::contains("1 of 2 type(s) failed checks"));
}

#[test]
fn check_reports_broken_chain() {
    let project = Project::new();
    let broken = catalog(Some(&person_fingerprint())).replace("migrate_2", "migrate_3");
    project.write("catalog.toml", &broken);

    project
        .cmd()
        .args(["--catalog", "catalog.toml", "check", "app::Person"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("must be consecutive"));
}

#[test]
fn chain_lists_steps() {
    let project = Project::new();
    project.write("catalog.toml", &catalog(None));

    project
        .cmd()
        .args(["--catalog", "catalog.toml", "chain", "app::Person"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app::Person (current version 2)"))
        .stdout(predicate::str::contains(
            "2  app::Person::migrate_2(data: object, context: context) -> object",
        ));
}

// =============================================================================
// migrate
// =============================================================================

#[test]
fn migrate_passes_through_current_documents() {
    let project = Project::new();
    project.write("catalog.toml", &catalog(None));
    project.write("person.json", r#"{"Name": "Ann", "Age": 3, "Version": 2}"#);

    project
        .cmd()
        .args(["--catalog", "catalog.toml", "migrate", "app::Person", "person.json", "--verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Name\": \"Ann\""))
        .stderr(predicate::str::contains("up to date (version 2)"));
}

#[test]
fn migrate_verification_catches_extra_properties() {
    let project = Project::new();
    project.write("catalog.toml", &catalog(None));

    project
        .cmd()
        .args(["--catalog", "catalog.toml", "migrate", "app::Person", "--verify"])
        .write_stdin(r#"{"Name": "Ann", "Age": 3, "Nick": "A", "Version": 2}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("properties [Nick] don't exist"));
}

#[test]
fn migrate_needs_bound_steps() {
    let project = Project::new();
    project.write("catalog.toml", &catalog(None));

    project
        .cmd()
        .args(["--catalog", "catalog.toml", "migrate", "app::Person", "-"])
        .write_stdin(r#"{"Name": "Ann", "Version": 1}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no invocable migration step to version 2"));
}

#[test]
fn migrate_rejects_newer_documents() {
    let project = Project::new();
    project.write("catalog.toml", &catalog(None));

    project
        .cmd()
        .args(["--catalog", "catalog.toml", "migrate", "app::Person"])
        .write_stdin(r#"{"Version": 5}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("this build only supports version 2"));
}

// =============================================================================
// init / config
// =============================================================================

#[test]
fn init_writes_config_used_by_later_runs() {
    let project = Project::new();
    project.write("types/catalog.toml", &catalog(None));

    project
        .cmd()
        .args(["--catalog", "types/catalog.toml", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert!(project.path().join(".docmigrate/config.toml").exists());

    project
        .cmd()
        .args(["shape", "app::Plain"])
        .assert()
        .success()
        .stdout("u64-Id\n");

    project
        .cmd()
        .args(["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

#[test]
fn configured_version_marker_is_excluded_from_shape() {
    let project = Project::new();
    project.write(
        "catalog.toml",
        r#"
[[types]]
name = "app::Rev"
members = [
    { name = "Name", type = "String" },
    { name = "Version", type = "u32" },
    { name = "Rev", type = "u32" },
]

[types.migration]
"#,
    );
    project.write(
        ".docmigrate/config.toml",
        "catalogs = [\"catalog.toml\"]\n\n[version]\nproperty = \"Rev\"\nlegacy = []\n",
    );

    project
        .cmd()
        .args(["shape", "app::Rev"])
        .assert()
        .success()
        .stdout("String-Name|u32-Version\n");

    project
        .cmd()
        .args(["hash", "app::Rev"])
        .assert()
        .success()
        .stdout(format!(
            "{}\n",
            Fingerprint::compute("String-Name|u32-Version")
        ));

    project
        .cmd()
        .args(["check", "app::Rev"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            Fingerprint::compute("String-Name|u32-Version").to_string(),
        ));
}

#[test]
fn deprecated_config_location_warns() {
    let project = Project::new();
    project.write("catalog.toml", &catalog(None));
    project.write("docmigrate.toml", "catalogs = [\"catalog.toml\"]\n");

    project
        .cmd()
        .args(["shape", "app::Plain"])
        .assert()
        .success()
        .stdout("u64-Id\n")
        .stderr(predicate::str::contains("deprecated config location"));
}

#[test]
fn invalid_config_is_an_error() {
    let project = Project::new();
    project.write(".docmigrate/config.toml", "unknown_key = true\n");

    project
        .cmd()
        .args(["shape", "app::Plain"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn completion_generates_script() {
    let project = Project::new();
    project
        .cmd()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docmigrate"));
}
