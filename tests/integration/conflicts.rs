use compkit_cli::test_utils::ManifestBuilder;
use predicates::prelude::*;

use crate::common::{TestProject, dialog_registry};

#[tokio::test]
async fn test_existing_file_blocks_the_whole_install() {
    let project = TestProject::with_registry(dialog_registry()).await;
    project.write("components/ui/portal.tsx", "// my own portal\n");

    project
        .compkit()
        .args(["add", "overlay"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("1 file(s) already exist"))
        .stderr(predicate::str::contains("portal.tsx"))
        .stderr(predicate::str::contains("(during install)"));

    assert_eq!(project.files(), vec!["components/ui/portal.tsx"]);
    assert_eq!(project.read("components/ui/portal.tsx"), "// my own portal\n");
}

#[tokio::test]
async fn test_force_overwrites_conflicting_files() {
    let project = TestProject::with_registry(dialog_registry()).await;
    project.write("components/ui/portal.tsx", "// my own portal\n");

    project
        .compkit()
        .args(["add", "overlay", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 created, 1 updated, 0 unchanged"));

    assert_eq!(project.read("components/ui/portal.tsx"), "export function Portal() {\n  return null;\n}\n");
}

fn diverging_registry() -> Vec<compkit_cli::models::ComponentManifest> {
    vec![
        ManifestBuilder::new("table", "1.0.0").depends_on("icon", "1.0.0").depends_on("toolbar", "latest").build(),
        ManifestBuilder::new("toolbar", "1.0.0").depends_on("icon", "2.0.0").build(),
        ManifestBuilder::new("icon", "1.0.0").build(),
        ManifestBuilder::new("icon", "2.0.0").build(),
    ]
}

#[tokio::test]
async fn test_version_conflicts_keep_the_first_resolved_version() {
    let project = TestProject::with_registry(diverging_registry()).await;

    project
        .compkit()
        .args(["add", "table"])
        .assert()
        .success()
        .stderr(predicate::str::contains("warning: 'toolbar' requires icon@2.0.0 but 1.0.0 was kept"));

    assert_eq!(
        project.files(),
        vec!["components/ui/icon.tsx", "components/ui/table.tsx", "components/ui/toolbar.tsx"]
    );
}

#[tokio::test]
async fn test_strict_versions_fail_on_conflict() {
    let project = TestProject::with_registry(diverging_registry()).await;

    project
        .compkit()
        .args(["add", "table", "--strict-versions"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Version conflict for 'icon'"))
        .stderr(predicate::str::contains("(during resolve)"));

    assert!(project.files().is_empty());
}
