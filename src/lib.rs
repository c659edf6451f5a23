//! Device import and deduplication engine.
//!
//! Pulls photos and videos from removable devices into a managed,
//! date-organized library, deduplicating by content hash so re-running an
//! import is always safe. Device access goes through the [`access`]
//! traits, so transports with thread-affine handles (MTP and friends)
//! plug in behind a `Send + Sync` connector.

pub mod access;
pub mod core;
pub mod database;
pub mod schema;

pub use access::{DeviceConnector, DeviceFileAccess, OpenHandle};
pub use core::orchestrator::{
    FileOutcome, ImportOptions, ImportOrchestrator, ImportProgress, ImportReport,
};
pub use core::scanner::ScanMode;
