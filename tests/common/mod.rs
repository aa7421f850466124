//! Shared fixtures for compkit integration tests.

// Not every helper is used by every test module.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use compkit_cli::models::{ComponentManifest, FileKind};
use compkit_cli::test_utils::{ManifestBuilder, publish_to_directory};
use tempfile::TempDir;

/// A scratch project with a directory registry next to it.
pub struct TestProject {
    _dir: TempDir,
    root: PathBuf,
}

impl TestProject {
    /// Create the project and publish `manifests` into its registry.
    pub async fn with_registry(manifests: Vec<ComponentManifest>) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("app")).expect("create project dir");
        publish_to_directory(&root.join("registry"), manifests).await;
        Self {
            _dir: dir,
            root,
        }
    }

    /// The registry directory.
    pub fn registry(&self) -> PathBuf {
        self.root.join("registry")
    }

    /// The project directory commands run in.
    pub fn project(&self) -> PathBuf {
        self.root.join("app")
    }

    /// A path inside the project.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.project().join(relative)
    }

    /// Read a project file.
    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).expect("read project file")
    }

    /// Write a project file, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(path, content).expect("write project file");
    }

    /// Every file under the project, relative and `/`-separated, sorted.
    pub fn files(&self) -> Vec<String> {
        list_files(&self.project())
    }

    /// `compkit` running in the project directory against the test registry.
    pub fn compkit(&self) -> Command {
        let mut cmd = Command::cargo_bin("compkit").expect("compkit binary");
        cmd.current_dir(self.project())
            .env("COMPKIT_REGISTRY", self.registry())
            .env_remove("COMPKIT_MAX_PARALLEL")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}

/// Every file under `root`, relative and `/`-separated, sorted.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    files.sort();
    files
}

/// dialog → button, dialog → overlay → portal, with aliased imports and a stylesheet.
pub fn dialog_registry() -> Vec<ComponentManifest> {
    vec![
        ManifestBuilder::new("dialog", "1.0.0")
            .file(
                "ui/dialog.tsx",
                r#"import * as React from "react"
import type { ReactNode } from "react"
import { Button } from "button"
import { Overlay } from "@/registry/ui/overlay"
import { cn } from "@/registry/lib/utils"
import "./dialog.css"

export function Dialog({ children }: { children: ReactNode }) {
  return (
    <Overlay>
      <div className={cn("dialog")}>{children}</div>
      <Button>Close</Button>
    </Overlay>
  )
}
"#,
                FileKind::Component,
            )
            .file("ui/dialog.css", ".dialog { border-radius: 8px; }\n", FileKind::Style)
            .depends_on("button", "latest")
            .depends_on("overlay", "1.0.0")
            .package("react", "^18.2.0")
            .build(),
        ManifestBuilder::new("button", "1.0.0").build(),
        ManifestBuilder::new("button", "1.1.0")
            .file(
                "ui/button.tsx",
                "import { cn } from \"@/registry/lib/utils\"\n\nexport function Button(props: { children?: unknown }) {\n  return <button className={cn(\"btn\")} {...props} />\n}\n",
                FileKind::Component,
            )
            .file(
                "lib/utils.ts",
                "export function cn(...classes: string[]): string {\n  return classes.filter(Boolean).join(\" \")\n}\n",
                FileKind::Lib,
            )
            .package("react", "^18.0.0")
            .build(),
        ManifestBuilder::new("overlay", "1.0.0").depends_on("portal", "latest").build(),
        ManifestBuilder::new("portal", "2.0.0").build(),
    ]
}
