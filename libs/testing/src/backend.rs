//! The in-memory backend.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use ssoa_api::ApiError;
use tracing::{debug, info};

use crate::{Operation, SandboxError, SandboxSettings, SandboxState};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Call {
    pub operation: Operation,
    /// The primary identifier the call addressed.
    pub target: String,
}

/// In-memory implementation of every backend interface.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<SandboxState>,
    faults: Mutex<BTreeMap<Operation, VecDeque<ApiError>>>,
    calls: Mutex<Vec<Call>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: SandboxSettings) -> Self {
        Self::from_state(SandboxState::new(settings))
    }

    pub fn from_state(state: SandboxState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Loads the state from a JSON file. A missing file yields a fresh sandbox.
    pub fn open(path: &Path) -> Result<Self, SandboxError> {
        let state = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No sandbox state yet, starting empty");
                SandboxState::default()
            }
            Err(source) => {
                return Err(SandboxError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self::from_state(state))
    }

    /// Writes the state to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SandboxError> {
        let raw = serde_json::to_string_pretty(&self.snapshot())?;
        let write_err = |source| SandboxError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, raw).map_err(write_err)?;
        debug!(path = %path.display(), "Sandbox state saved");
        Ok(())
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SandboxState {
        lock(&self.state).clone()
    }

    /// Runs `f` against the state, e.g. to seed fixtures or inspect results.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SandboxState) -> R) -> R {
        f(&mut lock(&self.state))
    }

    // =========================================================================
    // Fault scripts
    // =========================================================================

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: ApiError) {
        self.fail_times(operation, 1, error);
    }

    /// Makes the next `times` calls of `operation` fail with `error`.
    pub fn fail_times(&self, operation: Operation, times: usize, error: ApiError) {
        lock(&self.faults)
            .entry(operation)
            .or_default()
            .extend(std::iter::repeat_n(error, times));
    }

    /// Makes the next submitted asynchronous request settle as failed.
    pub fn fail_next_request(&self, reason: impl Into<String>) {
        lock(&self.state).fail_next_request(reason);
    }

    // =========================================================================
    // Call recording
    // =========================================================================

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, operation: Operation) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Calls that changed (or tried to change) backend state.
    pub fn mutating_calls(&self) -> Vec<Call> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation.is_mutating())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Records the call, then either returns the next scripted fault for the
    /// operation or the locked state to execute against.
    pub(crate) fn begin(
        &self,
        operation: Operation,
        target: impl std::fmt::Display,
    ) -> Result<MutexGuard<'_, SandboxState>, ApiError> {
        let target = target.to_string();
        debug!(%operation, target = %target, "Backend call");
        lock(&self.calls).push(Call { operation, target });

        if let Some(fault) = lock(&self.faults)
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            debug!(%operation, error = %fault, "Injected fault");
            return Err(fault);
        }
        Ok(lock(&self.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faults_are_consumed_in_order() {
        let backend = MemoryBackend::new();
        backend.fail_times(Operation::TagResource, 2, ApiError::throttling("Rate exceeded"));

        assert!(backend.begin(Operation::TagResource, "a").is_err());
        assert!(backend.begin(Operation::UntagResource, "a").is_ok());
        assert!(backend.begin(Operation::TagResource, "a").is_err());
        assert!(backend.begin(Operation::TagResource, "a").is_ok());
        assert_eq!(backend.calls_to(Operation::TagResource), 3);
    }

    #[test]
    fn test_save_and_open() {
        let dir = std::env::temp_dir().join(format!("ssoa-sandbox-{}", uuid::Uuid::new_v4()));
        let path = dir.join("state.json");

        let backend = MemoryBackend::with_settings(SandboxSettings {
            page_size: 3,
            pending_polls: 0,
        });
        backend.save(&path).unwrap();

        let reopened = MemoryBackend::open(&path).unwrap();
        assert_eq!(reopened.snapshot().settings().page_size, 3);
        assert!(reopened.calls().is_empty());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let path = std::env::temp_dir().join(format!("ssoa-missing-{}.json", uuid::Uuid::new_v4()));
        let backend = MemoryBackend::open(&path).unwrap();
        assert_eq!(backend.snapshot(), SandboxState::default());
    }
}
