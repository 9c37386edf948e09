//! Diagram definition file loading. The top file must be YAML (JSON is
//! accepted by the same parser); included files may be YAML or CSV. Each
//! file is loaded at most once, includes are expanded depth-first before
//! the file that names them, and the resulting definition maps are
//! handed to the builder in load order so that later files override
//! earlier ones.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde_yaml::{Mapping, Value};

use crate::error::DefinitionError;

const TOP_LEVEL_KEYS: [&str; 7] = [
    "blocks",
    "connections",
    "diagram",
    "groups",
    "include",
    "rows",
    "styles",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileType {
    Yaml,
    Csv,
}

struct IncludeDef {
    path: PathBuf,
    file_type: FileType,
    delimiter: String,
}

/// Load the definition file at `path` together with everything it
/// includes, returning one definition mapping per file in merge order.
pub fn load_files(path: &Path) -> Result<Vec<Mapping>, DefinitionError> {
    let mut visited: Vec<PathBuf> = Vec::new();
    let mut documents: Vec<Mapping> = Vec::new();
    visit(path, FileType::Yaml, ",", &mut visited, &mut documents)?;
    Ok(documents)
}

fn visit(
    path: &Path,
    file_type: FileType,
    delimiter: &str,
    visited: &mut Vec<PathBuf>,
    documents: &mut Vec<Mapping>,
) -> Result<(), DefinitionError> {
    let real_path = path.canonicalize().map_err(|source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if visited.contains(&real_path) {
        warn!("file '{}' already included", real_path.display());
        return Ok(());
    }
    visited.push(real_path.clone());

    let defs = match file_type {
        FileType::Yaml => load_yaml(&real_path)?,
        FileType::Csv => load_csv(&real_path, delimiter)?,
    };

    let base_dir = real_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    for include in include_defs(&defs, &real_path)? {
        let target = if include.path.is_absolute() {
            include.path.clone()
        } else {
            base_dir.join(&include.path)
        };
        visit(
            &target,
            include.file_type,
            &include.delimiter,
            visited,
            documents,
        )?;
    }
    documents.push(defs);
    Ok(())
}

fn load_yaml(path: &Path) -> Result<Mapping, DefinitionError> {
    let content = fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value =
        serde_yaml::from_str(&content).map_err(|err| DefinitionError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    let mapping = match value {
        Value::Null => Mapping::new(),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(DefinitionError::Parse {
                path: path.to_path_buf(),
                message: "expected a mapping at the top level".to_string(),
            })
        }
    };
    for key in mapping.keys() {
        let key = key.as_str().ok_or_else(|| DefinitionError::TypeMismatch {
            context: path.display().to_string(),
            expected: "string keys",
        })?;
        if !TOP_LEVEL_KEYS.contains(&key) {
            return Err(DefinitionError::UnknownKey {
                key: key.to_string(),
                context: path.display().to_string(),
            });
        }
    }
    Ok(mapping)
}

/// CSV files contribute rows only. Fields are split on the configured
/// delimiter; empty fields become anonymous cells.
fn load_csv(path: &Path, delimiter: &str) -> Result<Mapping, DefinitionError> {
    let content = fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rows = Vec::new();
    for line in content.lines() {
        if line.is_empty() {
            continue;
        }
        let cells: Vec<Value> = line
            .split(delimiter)
            .map(|field| {
                let field = field.trim();
                if field.is_empty() {
                    Value::Null
                } else {
                    Value::String(field.to_string())
                }
            })
            .collect();
        rows.push(Value::Sequence(cells));
    }
    let mut mapping = Mapping::new();
    mapping.insert(Value::from("rows"), Value::Sequence(rows));
    Ok(mapping)
}

fn include_defs(defs: &Mapping, path: &Path) -> Result<Vec<IncludeDef>, DefinitionError> {
    let Some(value) = defs.get(&Value::from("include")) else {
        return Ok(Vec::new());
    };
    let seq = value
        .as_sequence()
        .ok_or_else(|| DefinitionError::TypeMismatch {
            context: format!("{}: include", path.display()),
            expected: "a sequence of include entries",
        })?;
    let mut includes = Vec::new();
    for entry in seq {
        let mapping = entry
            .as_mapping()
            .ok_or_else(|| DefinitionError::TypeMismatch {
                context: format!("{}: include entry", path.display()),
                expected: "a mapping with a 'path'",
            })?;
        let include_path = mapping
            .get(&Value::from("path"))
            .and_then(Value::as_str)
            .ok_or_else(|| DefinitionError::MissingField { field: "path" })?;
        let file_type = match mapping.get(&Value::from("type")).and_then(Value::as_str) {
            Some(text) => parse_file_type(text).ok_or_else(|| DefinitionError::TypeMismatch {
                context: format!("{}: include type", path.display()),
                expected: "'yaml' or 'csv'",
            })?,
            None => file_type_from_extension(include_path),
        };
        let delimiter = mapping
            .get(&Value::from("delimiter"))
            .and_then(Value::as_str)
            .unwrap_or(",")
            .to_string();
        includes.push(IncludeDef {
            path: PathBuf::from(include_path),
            file_type,
            delimiter,
        });
    }
    Ok(includes)
}

fn parse_file_type(text: &str) -> Option<FileType> {
    match text.to_ascii_lowercase().as_str() {
        "yaml" => Some(FileType::Yaml),
        "csv" => Some(FileType::Csv),
        _ => None,
    }
}

/// YAML is the default when the extension is missing or unrecognized.
fn file_type_from_extension(path: &str) -> FileType {
    let ext = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") | Some("txt") => FileType::Csv,
        _ => FileType::Yaml,
    }
}
