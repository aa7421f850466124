use predicates::prelude::*;

use crate::common::{TestProject, dialog_registry};

#[tokio::test]
async fn test_global_strategy_merges_component_sheets() {
    let project = TestProject::with_registry(dialog_registry()).await;
    project.write("components/styles/globals.css", "@tailwind base;\n");

    let add = |project: &TestProject| {
        project
            .compkit()
            .args(["add", "dialog", "--style", "global=styles/globals.css"])
            .args(["--alias", "@/registry/ui=./ui", "--alias", "@/registry/lib=./lib"])
            .assert()
            .success();
    };
    add(&project);

    assert!(!project.files().contains(&"components/ui/dialog.css".to_string()));
    assert_eq!(
        project.read("components/styles/globals.css"),
        "@tailwind base;\n\n/* compkit:dialog */\n.dialog { border-radius: 8px; }\n/* /compkit:dialog */\n"
    );
    assert!(project.read("components/ui/dialog.tsx").contains("import \"../styles/globals.css\"\n"));

    // Re-running leaves the shared sheet alone
    add(&project);
    assert_eq!(project.read("components/styles/globals.css").matches("/* compkit:dialog */").count(), 1);
}

#[tokio::test]
async fn test_class_helper_is_routed_to_project_module() {
    let project = TestProject::with_registry(dialog_registry()).await;

    project
        .compkit()
        .args(["add", "button", "--class-helper", "cn=@/lib/utils"])
        .assert()
        .success()
        .stdout(predicate::str::contains("button.tsx"));

    assert!(project.read("components/ui/button.tsx").starts_with("import { cn } from \"@/lib/utils\"\n"));
}
