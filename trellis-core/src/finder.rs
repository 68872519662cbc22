//! Controller discovery on disk.
//!
//! A controller directory holds one manifest per controller class:
//!
//! ```toml
//! namespace = "app::controllers"
//! class = "UserController"
//! ```
//!
//! The class identifier comes from what the manifest declares, never from
//! where the file sits in the tree.

use crate::logging::{debug, trace};
use crate::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Extension every file in a controller tree must carry.
pub const MANIFEST_EXTENSION: &str = "toml";

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    namespace: String,
    class: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerFinder;

impl ControllerFinder {
    pub fn new() -> Self {
        Self
    }

    /// Collect class identifiers from every manifest under `directory`.
    ///
    /// `Ok(None)` when no directory is given or it does not exist. Any file
    /// that is not a manifest is an error.
    pub fn find(&self, directory: Option<&Path>) -> Result<Option<Vec<String>>> {
        let Some(directory) = directory.filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(None);
        };
        if !directory.is_dir() {
            debug!(directory = %directory.display(), "Controller directory missing");
            return Ok(None);
        }

        let mut classes = Vec::new();
        self.walk(directory, &mut classes)?;
        debug!(
            directory = %directory.display(),
            classes = classes.len(),
            "Controller scan complete"
        );
        Ok(Some(classes))
    }

    fn walk(&self, directory: &Path, classes: &mut Vec<String>) -> Result<()> {
        let mut entries = fs::read_dir(directory)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                self.walk(&path, classes)?;
                continue;
            }

            let is_manifest = path
                .extension()
                .is_some_and(|ext| ext == MANIFEST_EXTENSION);
            if !path.is_file() || !is_manifest {
                return Err(Error::Container(format!(
                    "Unexpected file in controller directory: {}",
                    path.display()
                )));
            }

            let class = Self::class_identifier(&path)?;
            trace!(file = %path.display(), class = %class, "Found controller");
            classes.push(class);
        }

        Ok(())
    }

    fn class_identifier(path: &Path) -> Result<String> {
        let content = fs::read_to_string(path)?;
        let manifest: Manifest = toml::from_str(&content).map_err(|e| {
            Error::Container(format!("Invalid controller manifest {}: {}", path.display(), e))
        })?;

        let class = manifest.class.trim();
        if class.is_empty() {
            return Err(Error::Container(format!(
                "Controller manifest {} declares no class",
                path.display()
            )));
        }

        let namespace = manifest.namespace.trim().trim_end_matches("::");
        Ok(if namespace.is_empty() {
            class.to_string()
        } else {
            format!("{}::{}", namespace, class)
        })
    }
}
