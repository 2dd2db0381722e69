//! Dual-copy model storage
//!
//! Every save writes the primary file and then an identical `.bak` sibling.
//! Loading falls back to the backup when the primary is missing or broken,
//! and heals the primary from it; when both are unusable the caller gets a
//! default model.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::{ConfigCodec, FormatVersion, ParsedModel};
use crate::error::{ModelError, ParseError};
use crate::model::Model;

/// Which copy a model came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Defaults,
}

/// A loaded, validated model
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub model: Model,
    pub source: LoadSource,
    /// Format of the copy that was read, `None` for defaults
    pub version: Option<FormatVersion>,
    pub warnings: Vec<ParseError>,
}

/// Primary and backup model files
#[derive(Debug, Clone)]
pub struct ConfigStore {
    primary: PathBuf,
    backup: PathBuf,
}

impl ConfigStore {
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        let primary = primary.into();
        let backup = primary.with_extension("bak");
        Self { primary, backup }
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    /// Load the model, falling back to defaults when neither copy parses
    pub fn load(&self) -> LoadOutcome {
        match self.try_load() {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Model reset to defaults: {}", e);
                let mut model = Model::default();
                model.validate_settings();
                LoadOutcome {
                    model,
                    source: LoadSource::Defaults,
                    version: None,
                    warnings: Vec::new(),
                }
            }
        }
    }

    /// Load the primary copy, else the backup
    ///
    /// A model recovered from the backup is written back to the primary.
    pub fn try_load(&self) -> Result<LoadOutcome, ModelError> {
        let primary_error = match read_copy(&self.primary) {
            Ok(parsed) => return Ok(finish(parsed, LoadSource::Primary)),
            Err(e) => e,
        };
        warn!(
            "Failed to load model from {}: {}, trying backup",
            self.primary.display(),
            primary_error
        );

        match read_copy(&self.backup) {
            Ok(parsed) => {
                let outcome = finish(parsed, LoadSource::Backup);
                info!("Model recovered from {}", self.backup.display());
                if let Err(e) = write_copy(&self.primary, &ConfigCodec::serialize(&outcome.model)) {
                    warn!("Failed to restore {}: {}", self.primary.display(), e);
                }
                Ok(outcome)
            }
            Err(backup_error) => Err(ModelError::BothCopiesFailed {
                primary: primary_error.to_string(),
                backup: backup_error.to_string(),
            }),
        }
    }

    /// Bump the save counter and write both copies in the current format
    pub fn save(&self, model: &mut Model) -> Result<(), ModelError> {
        model.save_count = model.save_count.wrapping_add(1);
        let text = ConfigCodec::serialize(model);
        write_copy(&self.primary, &text)?;
        write_copy(&self.backup, &text)?;
        debug!(
            "Saved model {} (save #{}) to {}",
            model.vehicle_id,
            model.save_count,
            self.primary.display()
        );
        Ok(())
    }
}

fn read_copy(path: &Path) -> Result<ParsedModel, ModelError> {
    let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ConfigCodec::parse(&text)?)
}

fn finish(parsed: ParsedModel, source: LoadSource) -> LoadOutcome {
    for warning in &parsed.warnings {
        debug!("Model file: {}", warning);
    }
    let mut model = parsed.model;
    if model.validate_settings() {
        info!("Loaded model {} needed repairs", model.vehicle_id);
    }
    info!(
        "Loaded model {} ({} format, {} radio link(s))",
        model.vehicle_id,
        parsed.version,
        model.radio.links().len()
    );
    LoadOutcome {
        model,
        source,
        version: Some(parsed.version),
        warnings: parsed.warnings,
    }
}

fn write_copy(path: &Path, text: &str) -> Result<(), ModelError> {
    let io_error = |source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
    }
    let mut file = File::create(path).map_err(io_error)?;
    file.write_all(text.as_bytes()).map_err(io_error)?;
    file.sync_all().map_err(io_error)?;
    Ok(())
}
