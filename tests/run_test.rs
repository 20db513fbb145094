use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

const ONLINE_PAGE: &str = r#"<html><body>
<h4>Netherworld - Online</h4>
<table><tbody>
  <tr><td>Alice</td><td>beQuiet</td></tr>
  <tr><td>bob</td><td>[BEQUIET] Academy</td></tr>
  <tr><td>Mallory</td><td>Loud Crew</td></tr>
</tbody></table>
</body></html>"#;

const EMPTY_PAGE: &str = r#"<html><body>
<h4>Netherworld - Online</h4>
<table><tbody>
  <tr><td>Mallory</td><td>Loud Crew</td></tr>
</tbody></table>
</body></html>"#;

const MAINTENANCE_PAGE: &str = "<html><body><h1>Down for maintenance</h1></body></html>";

struct Fixture {
    tmp: TempDir,
    home: PathBuf,
    page: PathBuf,
}

impl Fixture {
    fn new(page: &str) -> Self {
        let tmp = tempdir().expect("tempdir");
        let home = tmp.path().join("home");
        let page_path = tmp.path().join("page.html");
        fs::write(&page_path, page).expect("write page");
        Self {
            tmp,
            home,
            page: page_path,
        }
    }

    fn set_page(&self, page: &str) {
        fs::write(&self.page, page).expect("rewrite page");
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("guild-lastseen");
        cmd.current_dir(self.tmp.path())
            .env("LASTSEEN_HOME", &self.home)
            .env("LASTSEEN_SOURCE_FILE", &self.page)
            .env_remove("DISCORD_WEBHOOK_URL")
            .env_remove("LASTSEEN_WEBHOOK_URL")
            .env_remove("MODE")
            .env_remove("LASTSEEN_MODE")
            .env_remove("LASTSEEN_TEST_POST");
        cmd
    }

    fn state(&self) -> serde_json::Value {
        read_json(&self.home.join("state_last_seen.json"))
    }
}

fn read_json(path: &Path) -> serde_json::Value {
    let raw = fs::read_to_string(path).expect("read state");
    serde_json::from_str(&raw).expect("parse state")
}

#[test]
fn hourly_run_enrolls_guild_members_and_marks_them_online() {
    let fx = Fixture::new(ONLINE_PAGE);

    fx.cmd()
        .args(["run", "--mode", "hourly"])
        .assert()
        .success()
        .stdout(predicate::str::contains("action=tick"))
        .stdout(predicate::str::contains("observed_at=20"))
        .stdout(predicate::str::contains("added=Alice,bob"));

    let members = fs::read_to_string(fx.home.join("members.txt")).expect("members");
    assert_eq!(members, "Alice\nbob\n");

    let state = fx.state();
    assert_eq!(state["last_status"]["Alice"], "online");
    assert_eq!(state["last_status"]["bob"], "online");
    assert!(state["last_seen"]["Alice"].as_u64().expect("timestamp") > 0);
    assert!(state["last_seen"].get("Mallory").is_none());
    assert_eq!(state["last_report_date"], "");
}

#[test]
fn members_who_leave_are_marked_offline_but_keep_last_seen() {
    let fx = Fixture::new(ONLINE_PAGE);
    fx.cmd().args(["run", "--mode", "hourly"]).assert().success();
    let seen_before = fx.state()["last_seen"]["Alice"].clone();

    fx.set_page(EMPTY_PAGE);
    fx.cmd().args(["run", "--mode", "hourly"]).assert().success();

    let state = fx.state();
    assert_eq!(state["last_status"]["Alice"], "offline");
    assert_eq!(state["last_seen"]["Alice"], seen_before);
    let members = fs::read_to_string(fx.home.join("members.txt")).expect("members");
    assert_eq!(members, "Alice\nbob\n");
}

#[test]
fn missing_table_is_a_clean_no_op() {
    let fx = Fixture::new(MAINTENANCE_PAGE);

    fx.cmd()
        .args(["run", "--mode", "hourly"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scrape=skipped"));

    assert!(!fx.home.join("state_last_seen.json").exists());
    assert!(!fx.home.join("members.txt").exists());
}

#[test]
fn daily_run_without_webhook_renders_but_keeps_gate_open() {
    let fx = Fixture::new(ONLINE_PAGE);

    fx.cmd()
        .args(["run", "--mode", "daily", "--print"])
        .assert()
        .success()
        .stdout(predicate::str::contains("report=no-webhook"))
        .stdout(predicate::str::contains("Netherworld – beQuiet last seen"))
        .stdout(predicate::str::contains("Alice — currently online and grinding"));

    assert_eq!(fx.state()["last_report_date"], "");
    let audit = fs::read_to_string(fx.home.join("logs/audit.log")).expect("audit log");
    assert!(audit.contains("reason=no-webhook"));
}

#[test]
fn corrupt_state_file_is_replaced() {
    let fx = Fixture::new(ONLINE_PAGE);
    fs::create_dir_all(&fx.home).expect("mkdir home");
    fs::write(fx.home.join("state_last_seen.json"), "{ not json").expect("write corrupt");

    fx.cmd().args(["run", "--mode", "hourly"]).assert().success();

    assert_eq!(fx.state()["last_status"]["Alice"], "online");
}

#[test]
fn invalid_mode_is_fatal() {
    let fx = Fixture::new(ONLINE_PAGE);

    fx.cmd()
        .env("LASTSEEN_MODE", "weekly")
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid run mode"));
}
