//! resume-desk - Resume ingestion and outreach bookkeeping over a hosted backend
//!
//! This crate provides:
//! - A session provider and route guard for the signed-in pages
//! - Resume ingestion (text extraction, upload, signed reference, record)
//! - A JSON editor and viewer for the stored resume
//! - Owner-scoped messages, templates (with debounced auto-save) and jobs
//! - Supabase and embedded (redb + filesystem) backends behind one set of traits

pub mod access;
pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod copy;
pub mod debounce;
pub mod editor;
pub mod guard;
pub mod ingest;
pub mod object_store;
pub mod records;
pub mod session;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod viewer;
pub mod workspace;

use backend::Backend;
use config::Config;
use copy::CopyTracker;
use debounce::Debouncer;
use ingest::IngestPipeline;
use session::SessionProvider;
use workspace::Workspace;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub backend: Backend,
    pub session: SessionProvider,
    pub ingest: IngestPipeline,
    pub workspace: tokio::sync::Mutex<Workspace>,
    pub autosave: Debouncer,
    pub copies: CopyTracker,
}

impl AppState {
    pub fn new(config: Config, backend: Backend) -> Self {
        let session = SessionProvider::new(backend.auth.clone());
        let ingest = IngestPipeline::new(backend.files.clone(), backend.records.clone());
        let autosave = Debouncer::new(config.autosave_delay);

        Self {
            config,
            backend,
            session,
            ingest,
            workspace: tokio::sync::Mutex::new(Workspace::default()),
            autosave,
            copies: CopyTracker::default(),
        }
    }

    /// Stop background work: auth listener, pending auto-saves, copy marks.
    pub fn shutdown(&self) {
        self.session.shutdown();
        self.autosave.cancel_all();
        self.copies.clear();
    }
}
