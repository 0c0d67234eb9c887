//! `directives` command - check the event directives in a markup file

use std::path::Path;

use anyhow::{Context, Result};

use tamnoon_core::directive::EventDirective;
use tamnoon_core::{DirectiveError, Page};

use crate::output::{Output, OutputFormat};

pub fn lint(file: &Path, output: &Output) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read markup file: {:?}", file))?;
    let page = Page::parse(&html);

    let mut valid: Vec<(String, EventDirective)> = Vec::new();
    let mut invalid: Vec<(String, DirectiveError)> = Vec::new();

    for elem in page.element_descendants(page.document_root()) {
        for class in page.class_tokens(elem) {
            match EventDirective::parse(&class) {
                Ok(directive) => valid.push((class, directive)),
                Err(DirectiveError::NotADirective(_)) => {}
                Err(e) => invalid.push((class, e)),
            }
        }
    }

    match output.format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "valid": valid.iter().map(|(class, d)| describe(class, d)).collect::<Vec<_>>(),
                "invalid": invalid
                    .iter()
                    .map(|(class, e)| serde_json::json!({"class": class, "error": e.to_string()}))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Human => {
            for (class, directive) in &valid {
                println!("{}", summarize(class, directive));
            }
            for (class, error) in &invalid {
                println!("✗ {}: {}", class, error);
            }
            println!(
                "\n{} directive(s), {} malformed",
                valid.len(),
                invalid.len()
            );
        }
        OutputFormat::Quiet => {
            for (class, _) in &invalid {
                println!("{}", class);
            }
        }
    }

    if !invalid.is_empty() {
        anyhow::bail!("{} malformed directive(s) in {:?}", invalid.len(), file);
    }
    Ok(())
}

fn describe(class: &str, directive: &EventDirective) -> serde_json::Value {
    match directive {
        EventDirective::Forward { event, method, key } => serde_json::json!({
            "class": class, "event": event, "method": method, "key": key,
        }),
        EventDirective::Publish {
            event,
            channel,
            method,
            key,
        } => serde_json::json!({
            "class": class, "event": event, "channel": channel, "method": method, "key": key,
        }),
    }
}

fn summarize(class: &str, directive: &EventDirective) -> String {
    match directive {
        EventDirective::Forward { event, method, key } => match key {
            Some(key) => format!("{} | {} -> {} (key: {})", class, event, method, key),
            None => format!("{} | {} -> {}", class, event, method),
        },
        EventDirective::Publish {
            event,
            channel,
            method,
            key,
        } => match key {
            Some(key) => format!(
                "{} | {} -> pub {} / {} (key: {})",
                class, event, channel, method, key
            ),
            None => format!("{} | {} -> pub {} / {}", class, event, channel, method),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lint_clean_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<html><body><button class="tmnnevent-click-increment">+</button></body></html>"#
        )
        .unwrap();

        let output = Output::new(OutputFormat::Quiet);
        assert!(lint(file.path(), &output).is_ok());
    }

    #[test]
    fn test_lint_reports_malformed_directive() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<html><body><button class="tmnnevent-click">x</button></body></html>"#
        )
        .unwrap();

        let output = Output::new(OutputFormat::Quiet);
        assert!(lint(file.path(), &output).is_err());
    }
}
