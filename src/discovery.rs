// SPDX-License-Identifier: AGPL-3.0-only

//! Runtime discovery of the reaction database file.
//!
//! # Discovery order
//!
//! 1. Injected override (tests, `--data-root=` flag)
//! 2. Environment variable (`CASCADE_DATA_ROOT`)
//! 3. `CARGO_MANIFEST_DIR` (development layout)
//! 4. Current working directory
//!
//! A directory qualifies as a data root when it holds
//! [`paths::REACTION_DATABASE`].

use crate::error::CascadeError;
use std::path::{Path, PathBuf};

/// Environment variable naming the data root.
pub const DATA_ROOT_ENV: &str = "CASCADE_DATA_ROOT";

/// Well-known files within the data root.
pub mod paths {
    /// Reaction tables (JSON).
    pub const REACTION_DATABASE: &str = "data/reactions.json";
}

/// Discover the data root with an optional override.
///
/// When `override_root` is `Some`, it is checked first, so tests can inject
/// a root without mutating the process environment.
///
/// # Errors
///
/// Returns [`CascadeError::DataLoad`] if no candidate holds the database.
pub fn try_discover_with_override(override_root: Option<&Path>) -> Result<PathBuf, CascadeError> {
    if let Some(root) = override_root {
        if is_valid_root(root) {
            return Ok(root.to_path_buf());
        }
    }

    if let Ok(root) = std::env::var(DATA_ROOT_ENV) {
        let p = PathBuf::from(&root);
        if is_valid_root(&p) {
            return Ok(p);
        }
        log::warn!("{DATA_ROOT_ENV}={root} does not contain {}", paths::REACTION_DATABASE);
    }

    let manifest_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if is_valid_root(&manifest_root) {
        return Ok(manifest_root);
    }

    if let Ok(cwd) = std::env::current_dir() {
        if is_valid_root(&cwd) {
            return Ok(cwd);
        }
    }

    Err(CascadeError::DataLoad(format!(
        "no data root found (need a directory containing {})",
        paths::REACTION_DATABASE
    )))
}

/// Discover the data root using the default order.
///
/// # Errors
///
/// Returns [`CascadeError::DataLoad`] if no candidate holds the database.
pub fn try_discover_data_root() -> Result<PathBuf, CascadeError> {
    try_discover_with_override(None)
}

/// Path of the reaction database under `root`.
#[must_use]
pub fn reaction_database_path(root: &Path) -> PathBuf {
    root.join(paths::REACTION_DATABASE)
}

fn is_valid_root(root: &Path) -> bool {
    reaction_database_path(root).is_file()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn manifest_root_ships_sample_database() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        assert!(is_valid_root(&root));
    }

    #[test]
    fn invalid_override_falls_through() {
        let root = try_discover_with_override(Some(Path::new("/nonexistent/cascade"))).unwrap();
        assert!(reaction_database_path(&root).is_file());
    }

    #[test]
    fn database_path_is_under_root() {
        let p = reaction_database_path(Path::new("/srv/cascade"));
        assert_eq!(p, PathBuf::from("/srv/cascade/data/reactions.json"));
    }
}
