//! List the components a registry publishes.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::constants::DEFAULT_REGISTRY_URL;
use crate::models::ComponentSummary;
use crate::registry::{RetryPolicy, open_registry};

/// Arguments of `compkit list`.
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Registry URL or directory
    #[arg(long, env = "COMPKIT_REGISTRY", default_value = DEFAULT_REGISTRY_URL)]
    registry: String,
}

impl ListCommand {
    /// Run the command.
    ///
    /// # Errors
    ///
    /// Registry failures after retries are exhausted.
    pub async fn execute(self, quiet: bool) -> Result<()> {
        let registry = open_registry(&self.registry)?;
        let components = RetryPolicy::default()
            .run("list components", || registry.list_components())
            .await?;

        if components.is_empty() {
            if !quiet {
                println!("No components published at {}", registry.location());
            }
            return Ok(());
        }
        for line in format_listing(&components) {
            println!("{line}");
        }
        Ok(())
    }
}

fn format_listing(components: &[ComponentSummary]) -> Vec<String> {
    let width = components.iter().map(|c| c.name.len()).max().unwrap_or(0);
    components
        .iter()
        .map(|c| {
            let latest = c.latest.as_deref().unwrap_or("-");
            let mut line = format!("{:<width$}  {}", c.name.bold(), latest.green());
            if let Some(description) = &c.description {
                line.push_str(&format!("  {}", description.dimmed()));
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_aligns_names() {
        colored::control::set_override(false);
        let lines = format_listing(&[
            ComponentSummary {
                name: "button".into(),
                latest: Some("1.1.0".into()),
                description: None,
            },
            ComponentSummary {
                name: "dialog".into(),
                latest: None,
                description: Some("Modal dialog".into()),
            },
            ComponentSummary {
                name: "tooltip-trigger".into(),
                latest: Some("0.3.0".into()),
                description: None,
            },
        ]);
        assert_eq!(
            lines,
            vec![
                "button           1.1.0",
                "dialog           -  Modal dialog",
                "tooltip-trigger  0.3.0",
            ]
        );
    }
}
