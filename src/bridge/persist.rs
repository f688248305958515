//! JSON persistence for the subscription tables.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::bridge::subscriptions::{SaveHook, Subscriptions};
use crate::common::error::{StoreError, StoreResult};

/// Writes the tables to a JSON file after every change.
pub struct JsonFileSaveHook {
    path: PathBuf,
}

impl JsonFileSaveHook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn persist_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Persist {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl SaveHook for JsonFileSaveHook {
    /// Uses atomic write (temp file + rename) so a crash never leaves a torn file.
    fn save(&self, subscriptions: &Subscriptions) -> StoreResult<()> {
        let temp_path = self.path.with_extension("json.tmp");
        let file = File::create(&temp_path).map_err(|e| self.persist_error(e))?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, subscriptions)?;
        writer.flush().map_err(|e| self.persist_error(e))?;
        drop(writer);

        fs::rename(&temp_path, &self.path).map_err(|e| self.persist_error(e))?;

        debug!(path = %self.path.display(), "Subscriptions saved");
        Ok(())
    }
}

/// Load the tables from disk. A missing file yields empty tables.
pub fn load_subscriptions(path: &Path) -> StoreResult<Subscriptions> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "No subscriptions file, starting empty");
            return Ok(Subscriptions::default());
        }
        Err(e) => {
            return Err(StoreError::Persist {
                path: path.display().to_string(),
                source: e,
            })
        }
    };

    let subscriptions: Subscriptions = serde_json::from_reader(BufReader::new(file))?;
    info!(
        relays = subscriptions.relays.len(),
        phrases = subscriptions.phrases.len(),
        emotes = subscriptions.emotes.len(),
        "Loaded subscriptions from {}",
        path.display()
    );
    Ok(subscriptions)
}
