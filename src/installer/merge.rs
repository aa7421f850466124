//! Files several components write into: the global stylesheet and `package.json`.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::core::{CompkitError, Result};

/// `sheet` with `component`'s marked block set to `css`.
///
/// An existing block for the component is replaced in place; otherwise the block is
/// appended.
#[must_use]
pub fn upsert_style_block(sheet: &str, component: &str, css: &str) -> String {
    let open = format!("/* compkit:{component} */");
    let close = format!("/* /compkit:{component} */");
    let block = format!("{open}\n{}\n{close}\n", css.trim_end());

    if let Some(start) = sheet.find(&open)
        && let Some(len) = sheet[start..].find(&close)
    {
        let mut end = start + len + close.len();
        if sheet[end..].starts_with('\n') {
            end += 1;
        }
        return format!("{}{block}{}", &sheet[..start], &sheet[end..]);
    }

    let mut out = sheet.to_string();
    if !out.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(&block);
    out
}

/// `existing` package.json text with `packages` merged into `dependencies`.
///
/// Key order of the existing document is preserved; new packages are appended.
///
/// # Errors
///
/// [`CompkitError::FileSystem`] when `existing` is not a JSON object or its
/// `dependencies` is not an object.
pub fn merge_package_json(
    path: &Path,
    existing: Option<&str>,
    packages: &BTreeMap<String, String>,
) -> Result<String> {
    let invalid = |reason: String| CompkitError::FileSystem {
        operation: "merge package.json".to_string(),
        path: path.to_path_buf(),
        reason,
    };

    let mut document = match existing {
        Some(text) if !text.trim().is_empty() => {
            serde_json::from_str::<Value>(text).map_err(|e| invalid(e.to_string()))?
        }
        _ => Value::Object(Map::new()),
    };
    let Value::Object(root) = &mut document else {
        return Err(invalid("top-level value is not an object".to_string()));
    };

    let dependencies =
        root.entry("dependencies").or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(dependencies) = dependencies else {
        return Err(invalid("`dependencies` is not an object".to_string()));
    };
    for (name, range) in packages {
        dependencies.insert(name.clone(), Value::String(range.clone()));
    }

    let mut text = serde_json::to_string_pretty(&document).map_err(|e| invalid(e.to_string()))?;
    text.push('\n');
    Ok(text)
}
