//! Local Dataverse schema definitions
//!
//! Definitions are JSON documents describing Power Apps objects (tables,
//! choices). They are read from a schema folder, patched in memory and never
//! written back.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder token replaced by service-assigned identifiers
pub const PLACEHOLDER: &str = "<GUID>";

/// Schema loading errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No '{name}' found under {folder}")]
    NotFound { name: String, folder: PathBuf },
}

/// A definition file and its parsed document
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub name: String,
    pub path: PathBuf,
    pub document: Value,
}

/// Load a single definition file.
pub fn load_definition(path: &Path) -> Result<SchemaDefinition, SchemaError> {
    let content = fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document = serde_json::from_str(&content).map_err(|source| SchemaError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(SchemaDefinition {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.to_path_buf(),
        document,
    })
}

/// Load definitions below `folder`.
///
/// With `file_name` only files with exactly that name are loaded, otherwise
/// every `.json` file. Walk order: the files of a directory sorted by name,
/// then its subdirectories sorted by name.
pub fn load_definitions(
    folder: &Path,
    file_name: Option<&str>,
) -> Result<Vec<SchemaDefinition>, SchemaError> {
    let mut definitions = Vec::new();
    walk(folder, file_name, &mut definitions)?;
    tracing::debug!(
        "Loaded {} definition(s) from {}",
        definitions.len(),
        folder.display()
    );
    Ok(definitions)
}

/// First definition named `file_name` in walk order.
pub fn find_definition(folder: &Path, file_name: &str) -> Result<SchemaDefinition, SchemaError> {
    load_definitions(folder, Some(file_name))?
        .into_iter()
        .next()
        .ok_or_else(|| SchemaError::NotFound {
            name: file_name.to_string(),
            folder: folder.to_path_buf(),
        })
}

fn walk(
    dir: &Path,
    file_name: Option<&str>,
    out: &mut Vec<SchemaDefinition>,
) -> Result<(), SchemaError> {
    let io_err = |source| SchemaError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        // is_dir follows symlinks
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else {
            files.push(path);
        }
    }
    files.sort();
    subdirs.sort();

    for path in files {
        let selected = match (file_name, path.file_name()) {
            (Some(wanted), Some(name)) => name == wanted,
            (None, _) => path.extension().is_some_and(|ext| ext == "json"),
            (Some(_), None) => false,
        };
        if selected {
            out.push(load_definition(&path)?);
        }
    }

    for subdir in subdirs {
        walk(&subdir, file_name, out)?;
    }

    Ok(())
}

/// Visit every scalar leaf of a document.
///
/// Objects and arrays are descended into. For any other value the callback
/// gets the key and the object holding it, and may rewrite that object in
/// place. Scalars sitting directly in arrays have no key and are skipped.
pub fn change_schema<F>(document: &mut Value, change: &mut F)
where
    F: FnMut(&str, &mut Map<String, Value>),
{
    match document {
        Value::Object(object) => change_object(object, change),
        Value::Array(items) => {
            for item in items {
                change_schema(item, change);
            }
        }
        _ => {}
    }
}

fn change_object<F>(object: &mut Map<String, Value>, change: &mut F)
where
    F: FnMut(&str, &mut Map<String, Value>),
{
    let keys: Vec<String> = object.keys().cloned().collect();
    for key in keys {
        let nested = matches!(
            object.get(&key),
            Some(Value::Object(_)) | Some(Value::Array(_))
        );

        if nested {
            if let Some(value) = object.get_mut(&key) {
                change_schema(value, change);
            }
        } else if object.contains_key(&key) {
            change(&key, object);
        }
    }
}

/// Fill `<GUID>` placeholders under `DataProviderId` and `DataSourceId`.
///
/// Returns the number of values rewritten. Every other value is left as is.
pub fn substitute_placeholders(
    document: &mut Value,
    provider_id: &str,
    datasource_id: &str,
) -> usize {
    let mut replaced = 0;

    change_schema(document, &mut |key: &str, object: &mut Map<String, Value>| {
        let replacement = match key {
            "DataProviderId" => provider_id,
            "DataSourceId" => datasource_id,
            _ => return,
        };

        if let Some(Value::String(current)) = object.get_mut(key) {
            if current.contains(PLACEHOLDER) {
                *current = current.replace(PLACEHOLDER, replacement);
                replaced += 1;
            }
        }
    });

    replaced
}
