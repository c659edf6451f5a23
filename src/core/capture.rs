use chrono::{DateTime, NaiveDate, Utc};
use std::fs;
use std::path::Path;

/// Resolves the capture date of a local media file. Implementations are
/// best-effort and never fail: when no metadata is available they fall
/// back to the file's modified time, so a missing date can never fail an
/// import.
pub trait CaptureDateResolver: Send + Sync {
    fn resolve(&self, path: &Path) -> NaiveDate;
}

/// Default resolver: file modified time, today's date if even that is
/// unreadable.
pub struct ModifiedDateResolver;

impl ModifiedDateResolver {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureDateResolver for ModifiedDateResolver {
    fn resolve(&self, path: &Path) -> NaiveDate {
        match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified).date_naive(),
            Err(e) => {
                log::warn!("Could not read modified time for {}: {}", path.display(), e);
                Utc::now().date_naive()
            }
        }
    }
}

impl Default for ModifiedDateResolver {
    fn default() -> Self {
        Self::new()
    }
}
