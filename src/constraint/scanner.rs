//! Project declaration scanner
//!
//! Walks the project tree for declaration files and extracts the
//! version constraint attribute each tool embeds in them. Individual
//! files that fail to parse are skipped; the scan itself only fails on
//! filesystem errors.

use std::path::Path;

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::tool::Tool;

/// Error type for the project scan. Per-file parse failures are not
/// errors; they are diagnostics visible in verbose mode only.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Failed to walk project tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A recognized declaration file suffix and its encoding.
struct SuffixRule {
    value: &'static str,
    json: bool,
}

/// Which files a tool declares its required version in, and where the
/// constraint lives inside them.
struct DeclarationSchema {
    suffixes: &'static [SuffixRule],
    /// Enclosing top-level block, or `None` for a root attribute.
    block: Option<&'static str>,
    attribute: &'static str,
}

const TERRAFORM_SCHEMA: DeclarationSchema = DeclarationSchema {
    suffixes: &[
        SuffixRule { value: ".tf", json: false },
        SuffixRule { value: ".tf.json", json: true },
    ],
    block: Some("terraform"),
    attribute: "required_version",
};

const TERRAGRUNT_SCHEMA: DeclarationSchema = DeclarationSchema {
    suffixes: &[
        SuffixRule { value: "terragrunt.hcl", json: false },
        SuffixRule { value: "terragrunt.hcl.json", json: true },
    ],
    block: None,
    attribute: "terragrunt_version_constraint",
};

fn schema(tool: Tool) -> &'static DeclarationSchema {
    match tool {
        Tool::Terraform | Tool::Tofu => &TERRAFORM_SCHEMA,
        Tool::Terragrunt => &TERRAGRUNT_SCHEMA,
    }
}

/// Scan `dir` for the tool's declaration files and return every
/// constraint string found, ordered by file path.
///
/// Hidden directories are skipped wholesale, which keeps module caches
/// and any dot-named version store out of the walk.
pub fn gather_required_version(tool: Tool, dir: &Path) -> Result<Vec<String>, ScanError> {
    let schema = schema(tool);
    let mut constraints = Vec::new();

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let Some(rule) = schema.suffixes.iter().find(|s| name.ends_with(s.value)) else {
            continue;
        };

        let content = match std::fs::read_to_string(entry.path()) {
            Ok(content) => content,
            Err(e) => {
                debug!("Skipping unreadable {}: {e}", entry.path().display());
                continue;
            }
        };

        // A fresh parse per file; nothing is shared across files.
        let extracted = if rule.json {
            extract_from_json(&content, schema)
        } else {
            extract_from_hcl(&content, schema)
        };

        match extracted {
            Ok(found) => {
                debug!("Read {} ({} constraint(s))", entry.path().display(), found.len());
                constraints.extend(found);
            }
            Err(reason) => {
                debug!("Skipping unparseable {}: {reason}", entry.path().display());
            }
        }
    }

    Ok(constraints)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn extract_from_hcl(content: &str, schema: &DeclarationSchema) -> Result<Vec<String>, String> {
    let body = hcl::parse(content).map_err(|e| e.to_string())?;

    let mut out = Vec::new();
    match schema.block {
        Some(block_name) => {
            for block in body
                .blocks()
                .filter(|b| b.identifier.as_str() == block_name)
            {
                collect_hcl_attribute(&block.body, schema.attribute, &mut out);
            }
        }
        None => collect_hcl_attribute(&body, schema.attribute, &mut out),
    }

    Ok(out)
}

fn collect_hcl_attribute(body: &hcl::Body, attribute: &str, out: &mut Vec<String>) {
    for attr in body.attributes().filter(|a| a.key.as_str() == attribute) {
        push_hcl_expression(&attr.expr, out);
    }
}

fn push_hcl_expression(expr: &hcl::Expression, out: &mut Vec<String>) {
    match expr {
        hcl::Expression::String(s) => out.push(s.clone()),
        hcl::Expression::Array(items) => {
            for item in items {
                push_hcl_expression(item, out);
            }
        }
        // Anything else (variables, templates) is indeterminate at
        // parse time and contributes nothing.
        _ => {}
    }
}

fn extract_from_json(content: &str, schema: &DeclarationSchema) -> Result<Vec<String>, String> {
    let value: serde_json::Value = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let mut out = Vec::new();
    match schema.block {
        Some(block_name) => match value.get(block_name) {
            // The JSON encoding allows a block to be one object or a
            // list of objects.
            Some(serde_json::Value::Object(object)) => {
                push_json_value(object.get(schema.attribute), &mut out);
            }
            Some(serde_json::Value::Array(objects)) => {
                for object in objects {
                    push_json_value(object.get(schema.attribute), &mut out);
                }
            }
            _ => {}
        },
        None => push_json_value(value.get(schema.attribute), &mut out),
    }

    Ok(out)
}

fn push_json_value(value: Option<&serde_json::Value>, out: &mut Vec<String>) {
    match value {
        Some(serde_json::Value::String(s)) => out.push(s.clone()),
        Some(serde_json::Value::Array(items)) => {
            for item in items {
                if let serde_json::Value::String(s) = item {
                    out.push(s.clone());
                }
            }
        }
        _ => {}
    }
}
