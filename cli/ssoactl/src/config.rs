//! Sandbox location and file loading.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;

/// Sandbox state file name.
const SANDBOX_FILE: &str = "sandbox.json";

/// Default sandbox path in the user's data directory.
pub fn default_sandbox_path() -> Result<PathBuf> {
    ProjectDirs::from("com", "ssoa", "ssoactl")
        .map(|dirs| dirs.data_dir().join(SANDBOX_FILE))
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))
}

/// Reads a JSON document from a file, or from stdin when the path is `-`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?
    };

    serde_json::from_str(&contents).with_context(|| format!("Failed to parse JSON from {:?}", path))
}

/// Writes a value as pretty JSON, creating parent directories.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let contents = serde_json::to_string_pretty(value)?;
    fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
}
