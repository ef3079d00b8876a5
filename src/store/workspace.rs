use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{SetupProfile, Suite, TestCase};
use crate::store::StoreError;

/// On-disk workspace: every suite, test case and setup profile the host
/// application knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub suites: Vec<Suite>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub setup_profiles: Vec<SetupProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

fn format_of(path: &Path) -> Result<Format, StoreError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        other => Err(StoreError::UnsupportedFormat(
            other.unwrap_or_default().to_owned(),
        )),
    }
}

impl Workspace {
    /// Load a workspace from a `.yaml`, `.yml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let workspace = match format {
            Format::Yaml => serde_yaml::from_str(&content)?,
            Format::Json => serde_json::from_str(&content)?,
        };
        tracing::debug!(path = %path.display(), "workspace loaded");
        Ok(workspace)
    }

    /// Write the workspace back, replacing the file atomically.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let content = match format_of(path)? {
            Format::Yaml => serde_yaml::to_string(self)?,
            Format::Json => serde_json::to_string_pretty(self)?,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| StoreError::io(path, e.error))?;
        tracing::debug!(path = %path.display(), "workspace saved");
        Ok(())
    }

    /// Write one edited suite back to the file at `path`.
    ///
    /// The file is re-read first. The write goes ahead only if the suite on
    /// disk is still exactly `previous`; only that suite is replaced, so
    /// edits to anything else made since the load are kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] if the suite on disk no longer
    /// matches `previous`, [`StoreError::SuiteNotFound`] if it is gone, and
    /// any load or save error.
    pub fn commit_suite(
        path: impl AsRef<Path>,
        previous: &Suite,
        updated: &Suite,
    ) -> Result<(), StoreError> {
        let path = path.as_ref();
        let mut workspace = Self::load(path)?;
        let on_disk = workspace
            .suites
            .iter_mut()
            .find(|s| s.id == previous.id)
            .ok_or_else(|| StoreError::SuiteNotFound(previous.id.clone()))?;

        if *on_disk != *previous {
            tracing::warn!(suite = %previous.id, "suite changed on disk, refusing to overwrite");
            return Err(StoreError::VersionConflict {
                suite_id: previous.id.clone(),
                expected: previous.version,
                actual: on_disk.version,
            });
        }

        *on_disk = updated.clone();
        workspace.save(path)
    }
}
