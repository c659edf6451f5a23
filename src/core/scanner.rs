use crate::access::{AccessError, EntryKind, OpenHandle};
use crate::core::dedup::DuplicateMatch;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Device access error: {0}")]
    Access(#[from] AccessError),

    #[error("Operation cancelled")]
    Cancelled,
}

/// One candidate file found on a device. Transient: lives for the
/// duration of the owning import session and is discarded afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceMediaFile {
    pub device_path: String,
    pub filename: String,
    pub size_bytes: i64,
    pub modified_at: DateTime<Utc>,
    pub content_hash: Option<String>,
    pub device_folder: String,
    pub duplicate_matches: Vec<DuplicateMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Every matching file under the folder.
    Full,
    /// Only files whose size/mtime are not already recorded for this
    /// device, to avoid re-copying unchanged files.
    Incremental,
}

pub struct DeviceScanner {
    supported_formats: HashSet<String>,
    max_depth: usize,
    max_files: usize,
    known_files: HashMap<String, (i64, String)>,
    cancellation_token: Arc<AtomicBool>,
}

impl DeviceScanner {
    pub fn new() -> Self {
        let mut supported_formats = HashSet::new();
        // Photos
        for ext in [
            "jpg", "jpeg", "png", "heic", "heif", "tiff", "tif", "webp", "cr3", "nef", "arw",
            "dng", "gif",
        ] {
            supported_formats.insert(ext.to_string());
        }
        // Videos
        for ext in ["mp4", "mov", "m4v", "avi", "mkv", "3gp", "webm"] {
            supported_formats.insert(ext.to_string());
        }

        Self {
            supported_formats,
            max_depth: 2,
            max_files: 10_000,
            known_files: HashMap::new(),
            cancellation_token: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Safety limit bounding scan output on very large folder trees.
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Prior-session snapshot enabling incremental mode: entries whose
    /// (device_path, size, mtime) match are not re-emitted.
    pub fn with_known_files(mut self, known_files: HashMap<String, (i64, String)>) -> Self {
        self.known_files = known_files;
        self
    }

    pub fn with_cancellation(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn is_supported_format(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.supported_formats.contains(&ext.to_lowercase())
            }
            _ => false,
        }
    }

    /// Walk a device folder and collect media candidates. An inaccessible
    /// subfolder is logged and skipped; only the root folder being
    /// unreadable aborts the scan.
    pub fn scan(
        &self,
        handle: &mut OpenHandle,
        folder: &str,
    ) -> Result<Vec<DeviceMediaFile>, ScanError> {
        let mut candidates = Vec::new();
        self.walk(handle, folder, folder, 0, &mut candidates)?;
        Ok(candidates)
    }

    fn walk(
        &self,
        handle: &mut OpenHandle,
        root: &str,
        folder: &str,
        depth: usize,
        out: &mut Vec<DeviceMediaFile>,
    ) -> Result<(), ScanError> {
        if self.cancellation_token.load(Ordering::Relaxed) {
            return Err(ScanError::Cancelled);
        }

        let entries = match handle.list(folder) {
            Ok(entries) => entries,
            Err(e) if folder == root => return Err(ScanError::Access(e)),
            Err(e) => {
                log::warn!("Skipping inaccessible device folder {}: {}", folder, e);
                return Ok(());
            }
        };

        for entry in entries {
            if out.len() >= self.max_files {
                log::info!(
                    "Scan of {} truncated at {} candidates",
                    root,
                    self.max_files
                );
                return Ok(());
            }

            match entry.kind {
                EntryKind::Folder => {
                    if depth < self.max_depth {
                        self.walk(handle, root, &entry.device_path, depth + 1, out)?;
                    }
                }
                EntryKind::File => {
                    if !self.is_supported_format(&entry.name) {
                        continue;
                    }

                    let modified_at = entry.modified_at.to_rfc3339();
                    if let Some((size, modified)) = self.known_files.get(&entry.device_path) {
                        if *size == entry.size_bytes && *modified == modified_at {
                            continue;
                        }
                    }

                    out.push(DeviceMediaFile {
                        device_path: entry.device_path,
                        filename: entry.name,
                        size_bytes: entry.size_bytes,
                        modified_at: entry.modified_at,
                        content_hash: None,
                        device_folder: folder.to_string(),
                        duplicate_matches: Vec::new(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl Default for DeviceScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::testing::MemoryDevice;

    fn open(device: &MemoryDevice) -> OpenHandle {
        OpenHandle::acquire(device, "dev-a").unwrap()
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let device = MemoryDevice::new();
        device.add_file("Camera", "img_001.jpg", b"a");
        device.add_file("Camera", "clip_001.mov", b"bb");
        device.add_file("Camera", "notes.txt", b"ccc");
        device.add_file("Camera", "no_extension", b"dddd");

        let scanner = DeviceScanner::new();
        let mut handle = open(&device);
        let candidates = scanner.scan(&mut handle, "Camera").unwrap();

        let names: Vec<&str> = candidates.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["clip_001.mov", "img_001.jpg"]);
    }

    #[test]
    fn test_scan_recurses_up_to_max_depth() {
        let device = MemoryDevice::new();
        device.add_file("DCIM", "root.jpg", b"a");
        device.add_file("DCIM/100APPLE", "one.jpg", b"b");
        device.add_file("DCIM/100APPLE/thumbs", "two.jpg", b"c");
        device.add_file("DCIM/100APPLE/thumbs/deep", "three.jpg", b"d");

        let scanner = DeviceScanner::new().with_max_depth(2);
        let mut handle = open(&device);
        let candidates = scanner.scan(&mut handle, "DCIM").unwrap();

        let names: Vec<&str> = candidates.iter().map(|c| c.filename.as_str()).collect();
        assert!(names.contains(&"root.jpg"));
        assert!(names.contains(&"one.jpg"));
        assert!(names.contains(&"two.jpg"));
        assert!(!names.contains(&"three.jpg"));
    }

    #[test]
    fn test_candidates_carry_logical_folder() {
        let device = MemoryDevice::new();
        device.add_file("DCIM/100APPLE", "one.jpg", b"b");

        let scanner = DeviceScanner::new();
        let mut handle = open(&device);
        let candidates = scanner.scan(&mut handle, "DCIM").unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].device_folder, "DCIM/100APPLE");
        assert_eq!(candidates[0].device_path, "DCIM/100APPLE/one.jpg");
        assert_eq!(candidates[0].size_bytes, 1);
    }

    #[test]
    fn test_unreadable_subfolder_is_skipped_not_fatal() {
        let device = MemoryDevice::new();
        device.add_file("Camera", "ok.jpg", b"a");
        device.add_file("Camera/broken", "lost.jpg", b"b");
        device.make_folder_unreadable("Camera/broken");

        let scanner = DeviceScanner::new();
        let mut handle = open(&device);
        let candidates = scanner.scan(&mut handle, "Camera").unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].filename, "ok.jpg");
    }

    #[test]
    fn test_unreadable_root_folder_is_fatal() {
        let device = MemoryDevice::new();
        device.add_file("Camera", "ok.jpg", b"a");
        device.make_folder_unreadable("Camera");

        let scanner = DeviceScanner::new();
        let mut handle = open(&device);
        let result = scanner.scan(&mut handle, "Camera");

        assert!(matches!(result, Err(ScanError::Access(_))));
    }

    #[test]
    fn test_max_files_truncation() {
        let device = MemoryDevice::new();
        for i in 0..10 {
            device.add_file("Camera", &format!("img_{:03}.jpg", i), b"x");
        }

        let scanner = DeviceScanner::new().with_max_files(4);
        let mut handle = open(&device);
        let candidates = scanner.scan(&mut handle, "Camera").unwrap();

        assert_eq!(candidates.len(), 4);
    }

    #[test]
    fn test_incremental_skips_unchanged_files() {
        let modified = Utc::now();
        let device = MemoryDevice::new();
        device.add_file_modified("Camera", "old.jpg", b"abc", modified);
        device.add_file_modified("Camera", "new.jpg", b"defg", modified);

        let mut known = HashMap::new();
        known.insert("Camera/old.jpg".to_string(), (3, modified.to_rfc3339()));
        // Same path but different size: must be re-emitted
        known.insert("Camera/new.jpg".to_string(), (999, modified.to_rfc3339()));

        let scanner = DeviceScanner::new().with_known_files(known);
        let mut handle = open(&device);
        let candidates = scanner.scan(&mut handle, "Camera").unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].filename, "new.jpg");
    }

    #[test]
    fn test_cancellation_before_scan() {
        let device = MemoryDevice::new();
        device.add_file("Camera", "img.jpg", b"a");

        let token = Arc::new(AtomicBool::new(true));
        let scanner = DeviceScanner::new().with_cancellation(token);
        let mut handle = open(&device);

        assert!(matches!(
            scanner.scan(&mut handle, "Camera"),
            Err(ScanError::Cancelled)
        ));
    }
}
