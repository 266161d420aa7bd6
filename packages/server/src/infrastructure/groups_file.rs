//! Groups file loader.
//!
//! The plain format is whitespace separated: a group count followed by that
//! many `name capacity` pairs.
//!
//! ```text
//! 2
//! lobby 2
//! dev   5
//! ```
//!
//! A file ending in `.json` is read as
//! `{"groups": [{"name": "lobby", "capacity": 2}, ...]}` instead.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::GroupDefinition;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to open file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("missing group count")]
    MissingCount,

    #[error("invalid group count '{0}'")]
    InvalidCount(String),

    /// 1-based index of the first group without a name/capacity pair.
    #[error("no info on group {0}")]
    MissingGroup(usize),

    #[error("invalid capacity '{value}' for group '{group}'")]
    InvalidCapacity { group: String, value: String },

    #[error("invalid JSON groups file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct GroupsDocument {
    groups: Vec<GroupEntry>,
}

#[derive(Debug, Deserialize)]
struct GroupEntry {
    name: String,
    capacity: usize,
}

/// Read the group definitions from `path`, choosing the format by extension.
pub fn load_groups_file(path: &Path) -> Result<Vec<GroupDefinition>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        parse_groups_json(&text)
    } else {
        parse_groups(&text)
    }
}

/// Parse the whitespace-separated format.
///
/// Tokens after the announced number of groups are ignored.
pub fn parse_groups(text: &str) -> Result<Vec<GroupDefinition>, ConfigError> {
    let mut tokens = text.split_whitespace();
    let count_token = tokens.next().ok_or(ConfigError::MissingCount)?;
    let count: usize = count_token
        .parse()
        .map_err(|_| ConfigError::InvalidCount(count_token.to_string()))?;

    let mut groups = Vec::new();
    for index in 1..=count {
        let (Some(name), Some(capacity)) = (tokens.next(), tokens.next()) else {
            return Err(ConfigError::MissingGroup(index));
        };
        let capacity = capacity
            .parse()
            .map_err(|_| ConfigError::InvalidCapacity {
                group: name.to_string(),
                value: capacity.to_string(),
            })?;
        groups.push(GroupDefinition::new(name, capacity));
    }
    Ok(groups)
}

pub fn parse_groups_json(text: &str) -> Result<Vec<GroupDefinition>, ConfigError> {
    let document: GroupsDocument = serde_json::from_str(text)?;
    Ok(document
        .groups
        .into_iter()
        .map(|entry| GroupDefinition::new(entry.name, entry.capacity))
        .collect())
}
