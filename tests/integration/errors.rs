use compkit_cli::models::FileKind;
use compkit_cli::test_utils::ManifestBuilder;
use predicates::prelude::*;

use crate::common::TestProject;

#[tokio::test]
async fn test_unknown_component_is_a_registry_failure() {
    let project = TestProject::with_registry(vec![ManifestBuilder::new("button", "1.0.0").build()]).await;

    project
        .compkit()
        .args(["add", "ghost"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Component 'ghost' not found in registry"))
        .stderr(predicate::str::contains("(during registry)"));
}

#[tokio::test]
async fn test_unknown_version_is_reported() {
    let project = TestProject::with_registry(vec![ManifestBuilder::new("button", "1.0.0").build()]).await;

    project
        .compkit()
        .args(["add", "button@9.9.9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("version '9.9.9' not found"));
}

#[tokio::test]
async fn test_cycles_are_named() {
    let project = TestProject::with_registry(vec![
        ManifestBuilder::new("a", "1.0.0").depends_on("b", "latest").build(),
        ManifestBuilder::new("b", "1.0.0").depends_on("c", "latest").build(),
        ManifestBuilder::new("c", "1.0.0").depends_on("a", "latest").build(),
    ])
    .await;

    project
        .compkit()
        .args(["add", "a"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Circular dependency detected: a → b → c → a"))
        .stderr(predicate::str::contains("(during resolve)"));

    assert!(project.files().is_empty());
}

#[tokio::test]
async fn test_unparsable_source_writes_nothing() {
    let project = TestProject::with_registry(vec![
        ManifestBuilder::new("chart", "1.0.0")
            .file("ui/chart.tsx", "export const Chart = () => <div>{\n", FileKind::Component)
            .depends_on("legend", "latest")
            .build(),
        ManifestBuilder::new("legend", "1.0.0").build(),
    ])
    .await;

    project
        .compkit()
        .args(["add", "chart"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse ui/chart.tsx"))
        .stderr(predicate::str::contains("(during transform)"));

    assert!(project.files().is_empty());
}

#[tokio::test]
async fn test_missing_stylesheet_is_a_style_reference_error() {
    let project = TestProject::with_registry(vec![
        ManifestBuilder::new("card", "1.0.0")
            .file("ui/card.tsx", "import \"./card.css\"\nexport const Card = 1\n", FileKind::Component)
            .build(),
    ])
    .await;

    project
        .compkit()
        .args(["add", "card"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unresolvable style reference './card.css'"));

    assert!(project.files().is_empty());
}

#[tokio::test]
async fn test_unreachable_registry_fails() {
    let project = TestProject::with_registry(Vec::new()).await;

    project
        .compkit()
        .args(["add", "button", "--registry", "http://127.0.0.1:9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Registry unreachable"));
}
