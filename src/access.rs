use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Device unavailable: {device_id}")]
    DeviceUnavailable { device_id: String },

    #[error("Folder not found on device: {folder}")]
    FolderNotFound { folder: String },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Device disconnected during {operation}")]
    Disconnected { operation: &'static str },

    #[error("Device returned no data for {operation} on {path}")]
    SilentFailure {
        operation: &'static str,
        path: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

/// One entry enumerated on a device. `device_path` is a device-scoped
/// identifier, not a local filesystem path.
#[derive(Debug, Clone)]
pub struct DeviceEntry {
    pub device_path: String,
    pub name: String,
    pub kind: EntryKind,
    pub size_bytes: i64,
    pub modified_at: DateTime<Utc>,
}

/// An open connection to one device. Handles are thread-affine: a handle
/// must only be used by the execution context that opened it, and
/// transports are expected to surface failures as `AccessError` rather
/// than returning empty results.
pub trait DeviceFileAccess: Send {
    fn list(&mut self, folder: &str) -> Result<Vec<DeviceEntry>, AccessError>;

    /// Copy one device file to a local destination, returning the number
    /// of bytes written.
    fn copy(&mut self, device_path: &str, destination: &Path) -> Result<u64, AccessError>;

    fn close(&mut self);
}

/// Factory for device handles. Shared freely across workers; each worker
/// opens its own handle through it.
pub trait DeviceConnector: Send + Sync {
    fn open(&self, device_id: &str) -> Result<Box<dyn DeviceFileAccess>, AccessError>;
}

/// Scoped wrapper around an open handle. Closing happens in `Drop`, so
/// every acquisition is paired with exactly one close on all exit paths,
/// including early returns and panics.
pub struct OpenHandle {
    inner: Option<Box<dyn DeviceFileAccess>>,
}

impl OpenHandle {
    pub fn acquire(connector: &dyn DeviceConnector, device_id: &str) -> Result<Self, AccessError> {
        let inner = connector.open(device_id)?;
        Ok(Self { inner: Some(inner) })
    }

    pub fn list(&mut self, folder: &str) -> Result<Vec<DeviceEntry>, AccessError> {
        self.handle().list(folder)
    }

    pub fn copy(&mut self, device_path: &str, destination: &Path) -> Result<u64, AccessError> {
        self.handle().copy(device_path, destination)
    }

    fn handle(&mut self) -> &mut Box<dyn DeviceFileAccess> {
        // Invariant: `inner` is only None after Drop has run.
        self.inner.as_mut().expect("handle used after close")
    }
}

impl Drop for OpenHandle {
    fn drop(&mut self) {
        if let Some(mut handle) = self.inner.take() {
            handle.close();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory device used across the crate's tests. Instruments every
    //! open/close so tests can assert handle hygiene, and injects the
    //! failure modes of a flaky transport (unreadable folders, dropped
    //! connections, truncated copies).

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct HandleCounters {
        pub opened: AtomicUsize,
        pub closed: AtomicUsize,
    }

    impl HandleCounters {
        pub fn balanced(&self) -> bool {
            self.opened.load(Ordering::SeqCst) == self.closed.load(Ordering::SeqCst)
        }
    }

    struct MemFile {
        name: String,
        folder: String,
        bytes: Vec<u8>,
        modified_at: DateTime<Utc>,
    }

    #[derive(Default)]
    struct DeviceState {
        files: Vec<MemFile>,
        folders: HashSet<String>,
        offline: bool,
        unreadable_folders: HashSet<String>,
        failing_copies: HashSet<String>,
        truncated_copies: HashSet<String>,
        copies_before_cancel: Option<(usize, Arc<std::sync::atomic::AtomicBool>)>,
        copy_calls: usize,
    }

    #[derive(Clone)]
    pub struct MemoryDevice {
        state: Arc<Mutex<DeviceState>>,
        pub counters: Arc<HandleCounters>,
    }

    impl MemoryDevice {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(DeviceState::default())),
                counters: Arc::new(HandleCounters::default()),
            }
        }

        pub fn add_file(&self, folder: &str, name: &str, bytes: &[u8]) {
            self.add_file_modified(folder, name, bytes, Utc::now());
        }

        pub fn add_file_modified(
            &self,
            folder: &str,
            name: &str,
            bytes: &[u8],
            modified_at: DateTime<Utc>,
        ) {
            let mut state = self.state.lock().unwrap();
            for (i, _) in folder.match_indices('/') {
                state.folders.insert(folder[..i].to_string());
            }
            state.folders.insert(folder.to_string());
            state.files.push(MemFile {
                name: name.to_string(),
                folder: folder.to_string(),
                bytes: bytes.to_vec(),
                modified_at,
            });
        }

        pub fn add_folder(&self, folder: &str) {
            self.state.lock().unwrap().folders.insert(folder.to_string());
        }

        pub fn set_offline(&self, offline: bool) {
            self.state.lock().unwrap().offline = offline;
        }

        pub fn make_folder_unreadable(&self, folder: &str) {
            self.state
                .lock()
                .unwrap()
                .unreadable_folders
                .insert(folder.to_string());
        }

        pub fn fail_copy_of(&self, device_path: &str) {
            self.state
                .lock()
                .unwrap()
                .failing_copies
                .insert(device_path.to_string());
        }

        pub fn truncate_copy_of(&self, device_path: &str) {
            self.state
                .lock()
                .unwrap()
                .truncated_copies
                .insert(device_path.to_string());
        }

        /// Flip the given flag after `n` successful copy calls. Gives
        /// cancellation tests a deterministic trigger point.
        pub fn cancel_after_copies(&self, n: usize, flag: Arc<std::sync::atomic::AtomicBool>) {
            self.state.lock().unwrap().copies_before_cancel = Some((n, flag));
        }
    }

    impl DeviceConnector for MemoryDevice {
        fn open(&self, device_id: &str) -> Result<Box<dyn DeviceFileAccess>, AccessError> {
            if self.state.lock().unwrap().offline {
                return Err(AccessError::DeviceUnavailable {
                    device_id: device_id.to_string(),
                });
            }
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MemoryHandle {
                state: self.state.clone(),
                counters: self.counters.clone(),
                closed: false,
            }))
        }
    }

    struct MemoryHandle {
        state: Arc<Mutex<DeviceState>>,
        counters: Arc<HandleCounters>,
        closed: bool,
    }

    impl DeviceFileAccess for MemoryHandle {
        fn list(&mut self, folder: &str) -> Result<Vec<DeviceEntry>, AccessError> {
            let state = self.state.lock().unwrap();
            if state.offline {
                return Err(AccessError::Disconnected { operation: "list" });
            }
            if state.unreadable_folders.contains(folder) {
                return Err(AccessError::PermissionDenied {
                    path: folder.to_string(),
                });
            }
            if !state.folders.contains(folder) {
                return Err(AccessError::FolderNotFound {
                    folder: folder.to_string(),
                });
            }

            let mut entries = Vec::new();
            let prefix = format!("{}/", folder);
            for sub in &state.folders {
                if let Some(rest) = sub.strip_prefix(&prefix) {
                    if !rest.is_empty() && !rest.contains('/') {
                        entries.push(DeviceEntry {
                            device_path: sub.clone(),
                            name: rest.to_string(),
                            kind: EntryKind::Folder,
                            size_bytes: 0,
                            modified_at: Utc::now(),
                        });
                    }
                }
            }
            for file in state.files.iter().filter(|f| f.folder == folder) {
                entries.push(DeviceEntry {
                    device_path: format!("{}/{}", file.folder, file.name),
                    name: file.name.clone(),
                    kind: EntryKind::File,
                    size_bytes: file.bytes.len() as i64,
                    modified_at: file.modified_at,
                });
            }
            entries.sort_by(|a, b| a.device_path.cmp(&b.device_path));
            Ok(entries)
        }

        fn copy(&mut self, device_path: &str, destination: &Path) -> Result<u64, AccessError> {
            let mut state = self.state.lock().unwrap();
            if state.offline {
                return Err(AccessError::Disconnected { operation: "copy" });
            }
            if state.failing_copies.contains(device_path) {
                return Err(AccessError::Disconnected { operation: "copy" });
            }

            let truncated = state.truncated_copies.contains(device_path);
            let bytes = state
                .files
                .iter()
                .find(|f| format!("{}/{}", f.folder, f.name) == device_path)
                .map(|f| f.bytes.clone())
                .ok_or_else(|| AccessError::SilentFailure {
                    operation: "copy",
                    path: device_path.to_string(),
                })?;

            let written = if truncated {
                &bytes[..bytes.len() / 2]
            } else {
                &bytes[..]
            };
            fs::write(destination, written)?;

            state.copy_calls += 1;
            if let Some((after, flag)) = &state.copies_before_cancel {
                if state.copy_calls >= *after {
                    flag.store(true, Ordering::SeqCst);
                }
            }

            Ok(written.len() as u64)
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.counters.closed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}
