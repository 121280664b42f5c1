use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// The binary run in an empty directory, with an AWS config that never reaches the network
fn copilot(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("copilot").unwrap();
    cmd.current_dir(dir.path());
    cmd.timeout(std::time::Duration::from_secs(60));
    cmd.env("AWS_REGION", "us-west-2");
    cmd.env("AWS_ACCESS_KEY_ID", "test");
    cmd.env("AWS_SECRET_ACCESS_KEY", "test");
    cmd.env("AWS_EC2_METADATA_DISABLED", "true");
    cmd.env_remove("AWS_PROFILE");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_the_command_groups() {
    let dir = TempDir::new().unwrap();

    copilot(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("app"))
        .stdout(predicate::str::contains("svc"))
        .stdout(predicate::str::contains("pipeline"));
}

#[test]
fn invalid_app_name_is_rejected_before_any_call() {
    let dir = TempDir::new().unwrap();

    copilot(&dir)
        .args(["app", "init", "My Shop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid application name"));
}

#[test]
fn dockerfile_and_image_conflict() {
    let dir = TempDir::new().unwrap();

    copilot(&dir)
        .args(["svc", "init", "-n", "api", "-d", "Dockerfile", "-i", "nginx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn unknown_storage_type_is_rejected() {
    let dir = TempDir::new().unwrap();

    copilot(&dir)
        .args(["storage", "init", "-t", "Redis", "-n", "cache", "-w", "api"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid storage type"));
}

#[test]
fn task_count_must_be_positive() {
    let dir = TempDir::new().unwrap();

    copilot(&dir)
        .args(["task", "run", "-n", "migrate", "--image", "busybox", "--count", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid task count"));
}

#[test]
fn task_count_is_capped() {
    let dir = TempDir::new().unwrap();

    copilot(&dir)
        .args(["task", "run", "-n", "migrate", "--image", "busybox", "--count", "11"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid task count"));
}

#[test]
fn secret_input_file_conflicts_with_values() {
    let dir = TempDir::new().unwrap();

    copilot(&dir)
        .args(["secret", "init", "--input-file", "secrets.yml", "--values", "test=abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
