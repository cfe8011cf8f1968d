//! JSON caches of expensive stage output (tracks, camera movement).

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::StubError;

/// Where to cache stage output, and whether existing caches may be reused.
#[derive(Debug, Clone, Default)]
pub struct StubPaths {
    pub tracks: Option<PathBuf>,
    pub camera_movement: Option<PathBuf>,
    pub read_from_stub: bool,
}

/// Write `value` as JSON, creating parent directories as needed.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), StubError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    debug!(path = %path.display(), "wrote stub");
    Ok(())
}

pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, StubError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Reuse the stub at `path` when allowed and present, otherwise compute and
/// write it (when a path is given).
pub fn load_or_compute<T, E, F>(
    path: Option<&Path>,
    read_from_stub: bool,
    compute: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    E: From<StubError>,
    F: FnOnce() -> Result<T, E>,
{
    if let Some(path) = path.filter(|p| read_from_stub && p.exists()) {
        info!(path = %path.display(), "loading stage output from stub");
        return Ok(load(path)?);
    }

    let value = compute()?;
    if let Some(path) = path {
        save(path, &value)?;
    }
    Ok(value)
}
