use assert_cmd::Command;
use orgnotify_core::db::open_db;
use orgnotify_core::{
    NotificationRecord, NotificationRepository, Organization, OrganizationRepository,
    SqliteNotificationRepository, SqliteOrganizationRepository,
};
use predicates::str::contains;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn cmd() -> Command {
    Command::cargo_bin("orgnotify").unwrap()
}

struct Deployment {
    dir: TempDir,
}

impl Deployment {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn database(&self) -> PathBuf {
        self.path("notifications.db")
    }

    fn seed(&self) {
        let conn = open_db(self.database()).unwrap();
        let orgs = SqliteOrganizationRepository::try_new(&conn).unwrap();
        orgs.upsert_organization(&Organization::new("ORG-A").with_report_type("CYHY"))
            .unwrap();
        let notifications = SqliteNotificationRepository::try_new(&conn).unwrap();
        notifications
            .create_notification(&NotificationRecord::new("ORG-A"))
            .unwrap();
        notifications
            .create_notification(&NotificationRecord::new("FORMER-CUSTOMER"))
            .unwrap();
    }

    fn count_notifications(&self) -> i64 {
        let conn = open_db(self.database()).unwrap();
        conn.query_row("SELECT COUNT(*) FROM notifications;", [], |row| row.get(0))
            .unwrap()
    }

    fn write_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    fn write_config(&self, renderer: &Path, delivery: &Path) -> PathBuf {
        let config = format!(
            r#"
[testing]
database = "{database}"
report_key = "integration-key"
eligible_orgs = ["ORG-A"]
output_base_dir = "{output}"

[testing.renderer]
program = "{renderer}"

[testing.delivery]
program = "{delivery}"
timeout_secs = 30
"#,
            database = self.database().display(),
            output = self.path("output").display(),
            renderer = renderer.display(),
            delivery = delivery.display(),
        );
        let path = self.path("orgnotify.toml");
        fs::write(&path, config).unwrap();
        path
    }
}

#[test]
fn invalid_log_level_exits_with_one() {
    cmd()
        .args(["testing", "--log-level", "verbose"])
        .env_remove("ORGNOTIFY_CONFIG")
        .assert()
        .code(1)
        .stderr(contains("not a valid logging level"));
}

#[test]
fn missing_config_file_exits_with_one() {
    let deployment = Deployment::new();
    cmd()
        .arg("testing")
        .arg("--config")
        .arg(deployment.path("absent.toml"))
        .assert()
        .code(1)
        .stderr(contains("cannot read config"));
}

#[test]
fn unknown_section_exits_with_one() {
    let deployment = Deployment::new();
    let config = deployment.write_config(Path::new("/bin/true"), Path::new("/bin/true"));
    cmd()
        .arg("production")
        .arg("--config")
        .arg(config)
        .assert()
        .code(1)
        .stderr(contains("config section `production` not found"));
}

#[test]
fn requires_section_argument() {
    cmd().assert().failure();
}

#[test]
fn missing_eligible_orgs_exits_with_one_and_keeps_records() {
    let deployment = Deployment::new();
    deployment.seed();
    let config = deployment.write_config(Path::new("/bin/true"), Path::new("/bin/true"));
    let content = fs::read_to_string(&config).unwrap();
    fs::write(&config, content.replace("eligible_orgs = [\"ORG-A\"]\n", "")).unwrap();

    cmd()
        .arg("testing")
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(contains("eligible_orgs"));
    assert_eq!(deployment.count_notifications(), 2);
}

#[cfg(unix)]
#[test]
fn full_run_delivers_and_reaps() {
    let deployment = Deployment::new();
    deployment.seed();
    let marker = deployment.path("delivered.marker");
    let renderer = deployment.write_script(
        "render.sh",
        r#"[ -n "$ORGNOTIFY_REPORT_KEY" ] || exit 9
echo '{"was_encrypted": true, "result": {"notifications": [{}]}}'"#,
    );
    let delivery =
        deployment.write_script("deliver.sh", &format!("touch '{}'", marker.display()));
    let config = deployment.write_config(&renderer, &delivery);

    cmd()
        .args(["testing", "--log-level", "info", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("status=created org_id=ORG-A"));

    assert!(marker.exists());
    assert_eq!(deployment.count_notifications(), 1);
    let latest = deployment.path("output").join("notification_archive").join("latest");
    assert!(fs::read_link(latest)
        .unwrap()
        .to_string_lossy()
        .contains("notifications"));
}

#[cfg(unix)]
#[test]
fn no_content_run_skips_delivery() {
    let deployment = Deployment::new();
    deployment.seed();
    let marker = deployment.path("delivered.marker");
    let renderer = deployment.write_script(
        "render.sh",
        r#"echo '{"was_encrypted": false, "result": {"notifications": []}}'"#,
    );
    let delivery =
        deployment.write_script("deliver.sh", &format!("touch '{}'", marker.display()));
    let config = deployment.write_config(&renderer, &delivery);

    cmd()
        .args(["testing", "--config"])
        .arg(&config)
        .assert()
        .success();

    assert!(!marker.exists());
    assert_eq!(deployment.count_notifications(), 1);
}

#[cfg(unix)]
#[test]
fn unknown_renderer_output_exits_with_generation_failure() {
    let deployment = Deployment::new();
    deployment.seed();
    let marker = deployment.path("delivered.marker");
    let renderer = deployment.write_script("render.sh", "echo 'not json'");
    let delivery =
        deployment.write_script("deliver.sh", &format!("touch '{}'", marker.display()));
    let config = deployment.write_config(&renderer, &delivery);

    cmd()
        .args(["testing", "--config"])
        .arg(&config)
        .assert()
        .code(3)
        .stderr(contains("unknown generation failure for organization ORG-A"));

    assert!(!marker.exists());
    assert_eq!(deployment.count_notifications(), 2);
}
