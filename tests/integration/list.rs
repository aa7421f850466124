use predicates::prelude::*;

use crate::common::{TestProject, dialog_registry};

#[tokio::test]
async fn test_list_shows_latest_versions() {
    let project = TestProject::with_registry(dialog_registry()).await;

    project
        .compkit()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("button   1.1.0"))
        .stdout(predicate::str::contains("dialog   1.0.0"))
        .stdout(predicate::str::contains("portal   2.0.0"));
}

#[tokio::test]
async fn test_list_of_empty_registry() {
    let project = TestProject::with_registry(Vec::new()).await;
    std::fs::create_dir_all(project.registry()).unwrap();

    project
        .compkit()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No components published"));
}

#[tokio::test]
async fn test_list_accepts_registry_flag() {
    let project = TestProject::with_registry(dialog_registry()).await;
    let registry = project.registry();

    project
        .compkit()
        .env_remove("COMPKIT_REGISTRY")
        .args(["list", "--registry"])
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::contains("overlay"));
}
