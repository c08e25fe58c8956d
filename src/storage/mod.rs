//! Backend stores
//!
//! Every ward operation is one round trip to a store:
//! - filtered, ordered reads of patient and daily report rows
//! - partial-column updates of the patient rows matching a filter
//!
//! `MemoryStore` keeps the tables in process (optionally persisted to a JSON
//! snapshot); `PostgrestStore` talks to a hosted PostgREST database.

mod memory;
mod persistence;
mod postgrest;

pub use memory::MemoryStore;
pub use persistence::{Snapshot, SnapshotFile};
pub use postgrest::PostgrestStore;

use async_trait::async_trait;
use thiserror::Error;
use crate::query::{Filter, Query};
use crate::ward::{DailyReport, Patient, PatientUpdate};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("Snapshot error: {0}")]
    Snapshot(String),
    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

#[async_trait]
pub trait WardStore: Send + Sync {
    async fn fetch_patients(&self, query: &Query) -> Result<Vec<Patient>, StorageError>;

    async fn fetch_reports(&self, query: &Query) -> Result<Vec<DailyReport>, StorageError>;

    /// Applies `update` to every row of `table` matching `filter` and returns
    /// the number of rows written.
    async fn update_patients(
        &self,
        table: &str,
        filter: &Filter,
        update: &PatientUpdate,
    ) -> Result<usize, StorageError>;

    /// Persists buffered state, if the store buffers any.
    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
