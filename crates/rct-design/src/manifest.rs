use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use rct_core::errors::{ErrorInfo, RctError};
use rct_core::provenance::{DesignProvenance, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::config::DesignConfig;
use crate::design::{Design, DesignOutcome};

/// Structured record of a completed design run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignManifest {
    /// Schema of this manifest.
    pub schema_version: SchemaVersion,
    /// Configuration the design was built from.
    pub config: DesignConfig,
    /// Dataset digest, seeds and tool versions.
    pub provenance: DesignProvenance,
    /// Chosen assignment and search statistics.
    pub outcome: DesignOutcome,
}

impl DesignManifest {
    /// Captures a finished run of `design`.
    pub fn new(config: DesignConfig, design: &Design, outcome: DesignOutcome) -> Self {
        Self {
            schema_version: SchemaVersion::default(),
            config,
            provenance: provenance(design),
            outcome,
        }
    }

    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), RctError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                RctError::Serde(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            RctError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            RctError::Serde(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, RctError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            RctError::Serde(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            RctError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

fn provenance(design: &Design) -> DesignProvenance {
    let mut versions = BTreeMap::new();
    versions.insert(
        "rct-design".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    DesignProvenance {
        dataset_digest: design.dataset().digest().to_string(),
        content_hash: design.dataset().content_hash(),
        seed_shift: design.seed_shift(),
        seed: design.seed(),
        created_at: Utc::now().to_rfc3339(),
        tool_versions: versions,
    }
}
