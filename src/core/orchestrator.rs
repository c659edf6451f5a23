use crate::access::{AccessError, DeviceConnector, OpenHandle};
use crate::core::capture::{CaptureDateResolver, ModifiedDateResolver};
use crate::core::dedup::{DuplicateIndex, DuplicateMatch};
use crate::core::hash::{ContentHasher, Sha256Hasher};
use crate::core::organizer::FolderOrganizer;
use crate::core::scanner::{DeviceMediaFile, DeviceScanner, ScanError, ScanMode};
use crate::database::models::{NewLibraryFile, SessionStatus};
use crate::database::repositories::import_session::SessionCounts;
use crate::database::repositories::{
    DeviceRepository, ImportSessionRepository, LibraryFileRepository, Registration,
};
use crate::database::{DatabaseError, DbPool};
use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Cannot open device {device_id}: {source}")]
    DeviceUnavailable {
        device_id: String,
        #[source]
        source: AccessError,
    },

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Auto-import is disabled for device {device_id}")]
    AutoImportDisabled { device_id: String },

    #[error("Import worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportProgress {
    pub processed_count: usize,
    pub total_count: usize,
    pub current_filename: String,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Device folder to import from.
    pub folder: String,
    pub mode: ScanMode,
    pub max_depth: usize,
    /// Safety limit bounding import duration on very large folders.
    pub max_files: usize,
    /// Worker count. Defaults to 1: device handles are thread-affine and
    /// most transports only support one safe concurrent session. Raise
    /// only when the connector guarantees safe concurrent handles.
    pub concurrency: usize,
    /// Import cross-device duplicates instead of skipping them.
    pub import_duplicates: bool,
    pub project_id: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            folder: "Camera".to_string(),
            mode: ScanMode::Full,
            max_depth: 2,
            max_files: 10_000,
            concurrency: 1,
            import_duplicates: false,
            project_id: None,
        }
    }
}

/// Per-candidate resolution. Every requested file ends up in exactly one
/// of these, so failures stay nameable for targeted retries.
#[derive(Debug, Clone, Serialize)]
pub enum FileOutcome {
    Imported {
        library_file_id: String,
        path: String,
    },
    SkippedDuplicate {
        matches: Vec<DuplicateMatch>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub filename: String,
    pub device_path: String,
    pub outcome: FileOutcome,
}

#[derive(Debug)]
pub struct ImportReport {
    pub session: crate::database::models::ImportSession,
    pub files: Vec<FileReport>,
}

/// Drives one import run: scan, hash, dedup, copy, register, organize,
/// under a bounded worker pool with cooperative cancellation. Each worker
/// opens its own device handle; handles never cross worker boundaries.
pub struct ImportOrchestrator {
    pool: DbPool,
    connector: Arc<dyn DeviceConnector>,
    hasher: Arc<dyn ContentHasher>,
    capture_dates: Arc<dyn CaptureDateResolver>,
    library_root: PathBuf,
    progress_sender: Option<mpsc::UnboundedSender<ImportProgress>>,
    cancellation_token: Arc<AtomicBool>,
}

impl ImportOrchestrator {
    pub fn new(pool: DbPool, connector: Arc<dyn DeviceConnector>, library_root: PathBuf) -> Self {
        Self {
            pool,
            connector,
            hasher: Arc::new(Sha256Hasher::new()),
            capture_dates: Arc::new(ModifiedDateResolver::new()),
            library_root,
            progress_sender: None,
            cancellation_token: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_capture_date_resolver(mut self, resolver: Arc<dyn CaptureDateResolver>) -> Self {
        self.capture_dates = resolver;
        self
    }

    pub fn with_progress_sender(mut self, sender: mpsc::UnboundedSender<ImportProgress>) -> Self {
        self.progress_sender = Some(sender);
        self
    }

    pub fn get_cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancellation_token.clone()
    }

    pub fn cancel(&self) {
        self.cancellation_token.store(true, Ordering::Relaxed);
    }

    /// Run one import session against a device folder. The caller always
    /// gets back a finalized session with accurate counts; only
    /// session-level setup failures surface as errors, and even those
    /// leave a session row finalized as failed.
    pub async fn run(
        &self,
        device_id: &str,
        options: ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        let devices = DeviceRepository::new(self.pool.clone());
        let device = devices.upsert_seen(device_id, device_id)?;

        let sessions = ImportSessionRepository::new(self.pool.clone());
        let session = sessions.open(device_id, options.project_id.as_deref())?;
        log::info!(
            "Import session {} opened for device {} folder {}",
            session.id,
            device_id,
            options.folder
        );

        let counters = Arc::new(Mutex::new(SessionCounts::default()));
        let reports: Arc<Mutex<Vec<FileReport>>> = Arc::new(Mutex::new(Vec::new()));

        let result = self
            .drive(
                device_id,
                &device.display_name,
                &session.id,
                &options,
                counters.clone(),
                reports.clone(),
            )
            .await;

        // Session staging is transient; leftovers only exist after
        // failures and are safe to discard.
        let staging_root = self.library_root.join(".staging");
        let _ = fs::remove_dir_all(staging_root.join(&session.id));
        let _ = fs::remove_dir(staging_root);

        let counts = counters.lock().unwrap().clone();
        let files = std::mem::take(&mut *reports.lock().unwrap());

        match result {
            Ok(()) => {
                let status = if self.cancellation_token.load(Ordering::Relaxed) {
                    SessionStatus::Cancelled
                } else {
                    SessionStatus::Completed
                };
                let failed: Vec<String> = files
                    .iter()
                    .filter(|f| matches!(f.outcome, FileOutcome::Failed { .. }))
                    .map(|f| f.filename.clone())
                    .collect();

                let session = sessions.finalize(&session.id, status, &counts, &failed)?;
                log::info!(
                    "Import session {} finished: {} imported, {} skipped, {} failed",
                    session.id,
                    session.imported_count,
                    session.skipped_duplicate_count,
                    session.failed_count
                );
                Ok(ImportReport { session, files })
            }
            Err(err) => {
                if let Err(fin) =
                    sessions.finalize(&session.id, SessionStatus::Failed, &counts, &[])
                {
                    log::warn!("Could not finalize failed session {}: {}", session.id, fin);
                }
                Err(err)
            }
        }
    }

    /// Import using the device's stored auto-import preference. The
    /// preference layer is pure configuration; the session itself runs
    /// through `run` unchanged.
    pub async fn run_auto(&self, device_id: &str) -> Result<ImportReport, ImportError> {
        let devices = DeviceRepository::new(self.pool.clone());
        let device = devices.find_by_id(device_id)?;

        if !device.auto_import_enabled {
            return Err(ImportError::AutoImportDisabled {
                device_id: device_id.to_string(),
            });
        }

        let mut options = ImportOptions::default();
        if let Some(folder) = device.auto_import_folder {
            options.folder = folder;
        }
        self.run(device_id, options).await
    }

    async fn drive(
        &self,
        device_id: &str,
        device_name: &str,
        session_id: &str,
        options: &ImportOptions,
        counters: Arc<Mutex<SessionCounts>>,
        reports: Arc<Mutex<Vec<FileReport>>>,
    ) -> Result<(), ImportError> {
        // Scan inside its own worker context with its own handle;
        // enumeration can be slow and must not block the caller.
        let candidates = {
            let connector = self.connector.clone();
            let pool = self.pool.clone();
            let device_id = device_id.to_string();
            let folder = options.folder.clone();
            let mode = options.mode;
            let max_depth = options.max_depth;
            let max_files = options.max_files;
            let token = self.cancellation_token.clone();

            tokio::task::spawn_blocking(move || -> Result<Vec<DeviceMediaFile>, ImportError> {
                let mut scanner = DeviceScanner::new()
                    .with_max_depth(max_depth)
                    .with_max_files(max_files)
                    .with_cancellation(token);
                if mode == ScanMode::Incremental {
                    let known = LibraryFileRepository::new(pool).known_device_files(&device_id)?;
                    scanner = scanner.with_known_files(known);
                }

                let mut handle = OpenHandle::acquire(connector.as_ref(), &device_id).map_err(
                    |source| ImportError::DeviceUnavailable {
                        device_id: device_id.clone(),
                        source,
                    },
                )?;
                match scanner.scan(&mut handle, &folder) {
                    Ok(candidates) => Ok(candidates),
                    Err(ScanError::Cancelled) => Ok(Vec::new()),
                    Err(e) => Err(ImportError::Scan(e)),
                }
            })
            .await
            .map_err(|e| ImportError::Worker(e.to_string()))??
        };

        let total = candidates.len();
        ImportSessionRepository::new(self.pool.clone()).set_requested(session_id, total)?;

        let queue = Arc::new(Mutex::new(VecDeque::from(candidates)));
        let processed = Arc::new(AtomicUsize::new(0));
        let worker_count = options.concurrency.max(1).min(total);

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let ctx = WorkerContext {
                device_id: device_id.to_string(),
                device_name: device_name.to_string(),
                session_id: session_id.to_string(),
                pool: self.pool.clone(),
                connector: self.connector.clone(),
                hasher: self.hasher.clone(),
                capture_dates: self.capture_dates.clone(),
                library_root: self.library_root.clone(),
                import_duplicates: options.import_duplicates,
                project_id: options.project_id.clone(),
                queue: queue.clone(),
                counters: counters.clone(),
                reports: reports.clone(),
                processed: processed.clone(),
                total,
                progress_sender: self.progress_sender.clone(),
                cancellation_token: self.cancellation_token.clone(),
            };
            handles.push(tokio::task::spawn_blocking(move || worker_loop(ctx)));
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| ImportError::Worker(e.to_string()))??;
        }

        Ok(())
    }
}

#[derive(Clone)]
struct WorkerContext {
    device_id: String,
    device_name: String,
    session_id: String,
    pool: DbPool,
    connector: Arc<dyn DeviceConnector>,
    hasher: Arc<dyn ContentHasher>,
    capture_dates: Arc<dyn CaptureDateResolver>,
    library_root: PathBuf,
    import_duplicates: bool,
    project_id: Option<String>,
    queue: Arc<Mutex<VecDeque<DeviceMediaFile>>>,
    counters: Arc<Mutex<SessionCounts>>,
    reports: Arc<Mutex<Vec<FileReport>>>,
    processed: Arc<AtomicUsize>,
    total: usize,
    progress_sender: Option<mpsc::UnboundedSender<ImportProgress>>,
    cancellation_token: Arc<AtomicBool>,
}

/// One worker context. Opens its own device handle (thread affinity) and
/// processes candidates until the queue drains or cancellation is
/// requested. Only plain candidate data crosses into this function; the
/// handle is created and dropped here.
fn worker_loop(ctx: WorkerContext) -> Result<(), ImportError> {
    if ctx.queue.lock().unwrap().is_empty() {
        return Ok(());
    }

    let mut handle = OpenHandle::acquire(ctx.connector.as_ref(), &ctx.device_id).map_err(
        |source| ImportError::DeviceUnavailable {
            device_id: ctx.device_id.clone(),
            source,
        },
    )?;

    let index = DuplicateIndex::new(ctx.pool.clone());
    let library = LibraryFileRepository::new(ctx.pool.clone());
    let organizer = FolderOrganizer::new(ctx.library_root.clone());

    loop {
        // Cooperative cancellation: checked between candidates, never
        // interrupting an in-flight copy.
        if ctx.cancellation_token.load(Ordering::Relaxed) {
            break;
        }
        let candidate = ctx.queue.lock().unwrap().pop_front();
        let Some(mut candidate) = candidate else {
            break;
        };

        let outcome = process_candidate(&ctx, &mut handle, &index, &library, &organizer, &mut candidate);

        {
            let mut counts = ctx.counters.lock().unwrap();
            match &outcome {
                FileOutcome::Imported { .. } => counts.imported += 1,
                FileOutcome::SkippedDuplicate { .. } => counts.skipped_duplicate += 1,
                FileOutcome::Failed { .. } => counts.failed += 1,
            }
        }

        let done = ctx.processed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(sender) = &ctx.progress_sender {
            let _ = sender.send(ImportProgress {
                processed_count: done,
                total_count: ctx.total,
                current_filename: candidate.filename.clone(),
            });
        }

        ctx.reports.lock().unwrap().push(FileReport {
            filename: candidate.filename.clone(),
            device_path: candidate.device_path.clone(),
            outcome,
        });
    }

    Ok(())
}

/// Resolve one candidate. Every failure is absorbed into a Failed
/// outcome; nothing here aborts the session.
fn process_candidate(
    ctx: &WorkerContext,
    handle: &mut OpenHandle,
    index: &DuplicateIndex,
    library: &LibraryFileRepository,
    organizer: &FolderOrganizer,
    candidate: &mut DeviceMediaFile,
) -> FileOutcome {
    let staging_dir = ctx.library_root.join(".staging").join(&ctx.session_id);
    if let Err(e) = fs::create_dir_all(&staging_dir) {
        return FileOutcome::Failed {
            reason: format!("cannot create staging directory: {}", e),
        };
    }
    let staged = staging_dir.join(format!(
        "{}_{}",
        Uuid::new_v4().simple(),
        candidate.filename
    ));

    let copied = match handle.copy(&candidate.device_path, &staged) {
        Ok(copied) => copied,
        Err(e) => {
            log::warn!("Copy failed for {}: {}", candidate.device_path, e);
            let _ = fs::remove_file(&staged);
            return FileOutcome::Failed {
                reason: format!("copy failed: {}", e),
            };
        }
    };

    // Never register a truncated copy.
    let on_disk = fs::metadata(&staged).map(|m| m.len()).unwrap_or(0);
    let expected = candidate.size_bytes as u64;
    if copied != expected || on_disk != expected {
        log::warn!(
            "Byte count mismatch for {}: expected {}, copied {}, on disk {}",
            candidate.device_path,
            expected,
            copied,
            on_disk
        );
        let _ = fs::remove_file(&staged);
        return FileOutcome::Failed {
            reason: format!(
                "byte count mismatch: expected {}, copied {}",
                expected, copied
            ),
        };
    }

    let content_hash = match ctx.hasher.hash_file(&staged) {
        Ok(hash) => hash,
        Err(e) => {
            let _ = fs::remove_file(&staged);
            return FileOutcome::Failed {
                reason: format!("hash failed: {}", e),
            };
        }
    };
    candidate.content_hash = Some(content_hash.clone());

    let matches = match index.lookup(&content_hash, &ctx.device_id) {
        Ok(matches) => matches,
        Err(e) => {
            let _ = fs::remove_file(&staged);
            return FileOutcome::Failed {
                reason: format!("duplicate lookup failed: {}", e),
            };
        }
    };
    candidate.duplicate_matches = matches.clone();

    let class = DuplicateIndex::classify(&matches);
    if DuplicateIndex::should_skip(class, ctx.import_duplicates) {
        let _ = fs::remove_file(&staged);
        return FileOutcome::SkippedDuplicate { matches };
    }

    let capture_date = ctx.capture_dates.resolve(&staged);
    let placed = match organizer.place(
        &staged,
        &ctx.device_name,
        &candidate.device_folder,
        capture_date,
        &candidate.filename,
    ) {
        Ok(placed) => placed,
        Err(e) => {
            let _ = fs::remove_file(&staged);
            return FileOutcome::Failed {
                reason: format!("organize failed: {}", e),
            };
        }
    };

    let now = Utc::now().to_rfc3339();
    let new_file = NewLibraryFile {
        id: format!("lib_{}", Uuid::new_v4().simple()),
        path: placed.to_string_lossy().to_string(),
        content_hash,
        device_id: ctx.device_id.clone(),
        device_folder: candidate.device_folder.clone(),
        project_id: ctx.project_id.clone(),
        session_id: ctx.session_id.clone(),
        capture_date: capture_date.format("%Y-%m-%d").to_string(),
        kept_duplicate: !matches.is_empty(),
        source_path: candidate.device_path.clone(),
        size_bytes: candidate.size_bytes,
        modified_at: candidate.modified_at.to_rfc3339(),
        imported_at: now,
    };

    match library.register(new_file) {
        Ok(Registration::Created(row)) => FileOutcome::Imported {
            library_file_id: row.id,
            path: row.path,
        },
        Ok(Registration::RaceLost) => {
            // Another session registered the same content first; ours is
            // a duplicate after all.
            let _ = fs::remove_file(&placed);
            let matches = index
                .lookup(
                    candidate.content_hash.as_deref().unwrap_or_default(),
                    &ctx.device_id,
                )
                .unwrap_or_default();
            FileOutcome::SkippedDuplicate { matches }
        }
        Err(e) => {
            let _ = fs::remove_file(&placed);
            FileOutcome::Failed {
                reason: format!("registration failed: {}", e),
            }
        }
    }
}
