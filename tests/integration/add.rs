use predicates::prelude::*;

use crate::common::{TestProject, dialog_registry};

const ALIASES: [&str; 4] = ["--alias", "@/registry/ui=./ui", "--alias", "@/registry/lib=./lib"];

#[tokio::test]
async fn test_add_installs_the_whole_closure() {
    let project = TestProject::with_registry(dialog_registry()).await;
    project.write("package.json", "{\n  \"name\": \"app\"\n}\n");

    project
        .compkit()
        .args(["add", "dialog", "--to", "src/components", "--package-json", "package.json"])
        .args(ALIASES)
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed"))
        .stdout(predicate::str::contains("dialog@1.0.0 and 4 dependencies"))
        .stdout(predicate::str::contains("react@"));

    assert_eq!(
        project.files(),
        vec![
            "package.json",
            "src/components/lib/utils.ts",
            "src/components/ui/button.tsx",
            "src/components/ui/dialog.css",
            "src/components/ui/dialog.tsx",
            "src/components/ui/overlay.tsx",
            "src/components/ui/portal.tsx",
        ]
    );

    let dialog = project.read("src/components/ui/dialog.tsx");
    assert!(dialog.starts_with(
        r#"import * as React from "react"
import type { ReactNode } from "react"
import { Button } from "./button"
import { Overlay } from "./overlay"
import { cn } from "../lib/utils"
import "./dialog.css"
"#
    ));
    assert!(dialog.contains("<div className={cn(\"dialog\")}>{children}</div>"));

    let button = project.read("src/components/ui/button.tsx");
    assert!(button.starts_with("import { cn } from \"../lib/utils\"\n"));

    let package_json = project.read("package.json");
    assert!(package_json.starts_with("{\n  \"name\": \"app\",\n  \"dependencies\": {\n    \"react\": "));
}

#[tokio::test]
async fn test_add_for_javascript_projects() {
    let project = TestProject::with_registry(dialog_registry()).await;

    project.compkit().args(["add", "dialog", "--js"]).args(ALIASES).assert().success();

    assert_eq!(
        project.files(),
        vec![
            "components/lib/utils.js",
            "components/ui/button.jsx",
            "components/ui/dialog.css",
            "components/ui/dialog.jsx",
            "components/ui/overlay.jsx",
            "components/ui/portal.jsx",
        ]
    );
    let dialog = project.read("components/ui/dialog.jsx");
    assert!(!dialog.contains("import type"));
    assert!(dialog.starts_with("import * as React from \"react\"\nimport { Button } from \"./button\"\n"));
    assert!(dialog.contains("export function Dialog({ children }) {\n"));
    assert!(project.read("components/ui/button.jsx").contains("export function Button(props) {\n"));
    assert_eq!(
        project.read("components/lib/utils.js"),
        "export function cn(...classes) {\n  return classes.filter(Boolean).join(\" \")\n}\n"
    );
}

#[tokio::test]
async fn test_add_pinned_version() {
    let project = TestProject::with_registry(dialog_registry()).await;

    project.compkit().args(["add", "button", "--version", "1.0.0"]).assert().success();

    assert_eq!(project.files(), vec!["components/ui/button.tsx"]);
    assert_eq!(project.read("components/ui/button.tsx"), "export function Button() {\n  return null;\n}\n");
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let project = TestProject::with_registry(dialog_registry()).await;

    project
        .compkit()
        .args(["add", "dialog", "--dry-run"])
        .args(ALIASES)
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run:"))
        .stdout(predicate::str::contains("created"));

    assert!(project.files().is_empty());
}

#[tokio::test]
async fn test_reinstall_reports_unchanged_files() {
    let project = TestProject::with_registry(dialog_registry()).await;

    project.compkit().args(["add", "overlay"]).assert().success();
    project
        .compkit()
        .args(["add", "overlay"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 created, 0 updated, 2 unchanged"));
}

#[tokio::test]
async fn test_quiet_add_prints_nothing() {
    let project = TestProject::with_registry(dialog_registry()).await;

    project.compkit().args(["-q", "add", "portal"]).assert().success().stdout(predicate::str::is_empty());
    assert_eq!(project.files(), vec!["components/ui/portal.tsx"]);
}
