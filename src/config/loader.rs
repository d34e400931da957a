use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{AppError, AppResult, ConfigError};
use crate::suite::Suite;
use crate::test::Test;

/// Load one declarative suite. Every contained test remembers the suite
/// file's directory so `@file:` references resolve relative to it; an
/// unnamed suite takes the file stem as its name.
///
/// # Errors
///
/// Unreadable or unparseable files.
pub fn load_suite(path: &Path) -> AppResult<Suite> {
    let raw = read(path)?;
    let mut suite: Suite = serde_json::from_str(&raw).map_err(|err| {
        AppError::config(ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    let base_dir = base_dir_of(path);
    for test in suite
        .setup
        .iter_mut()
        .chain(suite.main.iter_mut())
        .chain(suite.teardown.iter_mut())
    {
        test.base_dir = base_dir.clone();
    }
    if suite.name.is_empty() {
        suite.name = file_stem(path);
    }
    Ok(suite)
}

/// Load one standalone declarative test.
///
/// # Errors
///
/// Unreadable or unparseable files.
pub fn load_test(path: &Path) -> AppResult<Test> {
    let raw = read(path)?;
    let mut test: Test = serde_json::from_str(&raw).map_err(|err| {
        AppError::config(ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    test.base_dir = base_dir_of(path);
    if test.name.is_empty() {
        test.name = file_stem(path);
    }
    Ok(test)
}

/// Load a flat JSON object of string variables.
///
/// # Errors
///
/// Unreadable files, or any shape other than `{"NAME": "value", ...}`.
pub fn load_vars_file(path: &Path) -> AppResult<BTreeMap<String, String>> {
    let raw = read(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|err| {
        AppError::config(ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    let serde_json::Value::Object(fields) = value else {
        return Err(AppError::config(ConfigError::VarsFileShape {
            path: path.to_path_buf(),
        }));
    };
    let mut variables = BTreeMap::new();
    for (name, field) in fields {
        let serde_json::Value::String(text) = field else {
            return Err(AppError::config(ConfigError::VarsFileShape {
                path: path.to_path_buf(),
            }));
        };
        variables.insert(name, text);
    }
    Ok(variables)
}

fn read(path: &Path) -> AppResult<String> {
    std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: err,
        })
    })
}

fn base_dir_of(path: &Path) -> std::path::PathBuf {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("unnamed")
        .to_owned()
}
