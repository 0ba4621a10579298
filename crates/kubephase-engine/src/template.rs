use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use kubephase_domain::ManifestPath;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ExpandError;

/// Build the render context from the run's data value.
///
/// # Errors
///
/// Returns an error when `data` is present but is neither null nor a mapping.
pub fn build_context(data: Option<&Value>) -> std::result::Result<tera::Context, ExpandError> {
    match data {
        None | Some(Value::Null) => Ok(tera::Context::new()),
        Some(Value::Object(map)) => {
            let mut context = tera::Context::new();
            for (key, value) in map {
                context.insert(key.as_str(), value);
            }
            Ok(context)
        }
        Some(other) => Err(ExpandError::ContextNotMapping {
            found: value_kind(other),
        }),
    }
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

fn register_helpers(tera: &mut tera::Tera) {
    tera.register_function("env", |args: &HashMap<String, tera::Value>| {
        let name = args
            .get("name")
            .and_then(tera::Value::as_str)
            .ok_or_else(|| tera::Error::msg("env() requires a `name` string argument"))?;

        match std::env::var(name) {
            Ok(value) => Ok(tera::Value::String(value)),
            Err(_) => args.get("default").cloned().ok_or_else(|| {
                tera::Error::msg(format!(
                    "env(name=\"{name}\") is not set in the current environment"
                ))
            }),
        }
    });
}

/// Render one manifest template against `context`.
///
/// The file is registered under its base name and rendered by that name.
///
/// # Errors
///
/// Returns an error when the file cannot be read, parsed, or rendered.
pub fn render_manifest(
    manifest: &ManifestPath,
    context: &tera::Context,
) -> std::result::Result<String, ExpandError> {
    let source = fs::read_to_string(manifest.as_path()).map_err(|source| {
        ExpandError::ReadTemplate {
            path: manifest.as_path().to_path_buf(),
            source,
        }
    })?;
    let name = manifest
        .file_name()
        .map_or_else(|| manifest.to_string(), |name| name.to_string_lossy().into_owned());

    let mut tera = tera::Tera::default();
    register_helpers(&mut tera);
    tera.add_raw_template(&name, &source)
        .map_err(|source| ExpandError::Parse {
            path: manifest.as_path().to_path_buf(),
            source,
        })?;

    tera.render(&name, context)
        .map_err(|source| ExpandError::Render {
            path: manifest.as_path().to_path_buf(),
            source,
        })
}

/// Render every manifest of a phase next to its source.
///
/// Stops at the first failing file; files written before it are left on disk.
///
/// # Errors
///
/// Returns an error naming the offending manifest when any file fails to read,
/// parse, render, or write.
pub fn expand(
    manifests: &[ManifestPath],
    data: Option<&Value>,
) -> std::result::Result<Vec<PathBuf>, ExpandError> {
    info!(
        "expanding {}",
        manifests
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    );
    let context = build_context(data)?;

    let mut rendered_paths = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        let rendered = render_manifest(manifest, &context)?;
        let output = manifest.rendered_path();
        fs::write(&output, rendered).map_err(|source| ExpandError::Write {
            path: output.clone(),
            source,
        })?;
        debug!(manifest = %manifest, output = %output.display(), "rendered manifest");
        rendered_paths.push(output);
    }

    Ok(rendered_paths)
}
