use crate::database::models::LibraryFile;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Places imported files into the date/device-derived library hierarchy:
/// `root/device_name/device_folder/YYYY-MM-DD/`.
pub struct FolderOrganizer {
    root: PathBuf,
}

impl FolderOrganizer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target_dir(&self, device_name: &str, device_folder: &str, capture_date: NaiveDate) -> PathBuf {
        self.root
            .join(sanitize(device_name))
            .join(sanitize(device_folder))
            .join(capture_date.format("%Y-%m-%d").to_string())
    }

    /// Move a staged file into its final library location. Name
    /// collisions with unrelated files are resolved with a numeric
    /// suffix.
    pub fn place(
        &self,
        staged: &Path,
        device_name: &str,
        device_folder: &str,
        capture_date: NaiveDate,
        filename: &str,
    ) -> Result<PathBuf, OrganizeError> {
        let dir = self.target_dir(device_name, device_folder, capture_date);
        fs::create_dir_all(&dir)?;

        let destination = unique_destination(&dir, filename);
        move_file(staged, &destination)?;
        Ok(destination)
    }

    /// Re-place an already-imported file. Returns `None` when the
    /// computed path is unchanged (no-op), otherwise the new path so the
    /// caller can update the library record.
    pub fn organize(
        &self,
        file: &LibraryFile,
        device_name: &str,
    ) -> Result<Option<PathBuf>, OrganizeError> {
        let capture_date = NaiveDate::parse_from_str(&file.capture_date, "%Y-%m-%d")
            .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default());

        let current = PathBuf::from(&file.path);
        let dir = self.target_dir(device_name, &file.device_folder, capture_date);

        if current.parent() == Some(dir.as_path()) {
            return Ok(None);
        }

        fs::create_dir_all(&dir)?;
        let filename = current
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.id.clone());
        let destination = unique_destination(&dir, &filename);
        move_file(&current, &destination)?;
        Ok(Some(destination))
    }
}

fn unique_destination(dir: &Path, filename: &str) -> PathBuf {
    let mut destination = dir.join(filename);
    let mut counter = 1;
    while destination.exists() {
        let (stem, ext) = match filename.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{}", ext)),
            None => (filename, String::new()),
        };
        destination = dir.join(format!("{}-{}{}", stem, counter, ext));
        counter += 1;
    }
    destination
}

fn move_file(from: &Path, to: &Path) -> Result<(), std::io::Error> {
    // Rename within the library volume; fall back to copy+remove when
    // the staging area sits on a different filesystem.
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)?;
            Ok(())
        }
    }
}

/// Device and folder names come from external sources; keep them from
/// escaping the library root.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '\\' | ':' => '-',
            _ => c,
        })
        .collect();
    cleaned
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect::<Vec<_>>()
        .join("/")
}
