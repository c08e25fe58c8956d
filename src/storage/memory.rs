use std::sync::RwLock;
use async_trait::async_trait;
use tracing::{debug, info};
use crate::query::{Filter, Query};
use crate::ward::{DailyReport, Patient, PatientUpdate};
use super::{Snapshot, SnapshotFile, StorageError, WardStore};

/// In-process tables, optionally backed by a JSON snapshot that is rewritten
/// after every update.
#[derive(Debug)]
pub struct MemoryStore {
    patients_table: String,
    reports_table: String,
    tables: RwLock<Snapshot>,
    snapshot: Option<SnapshotFile>,
}

impl MemoryStore {
    pub fn new(patients_table: &str, reports_table: &str) -> Self {
        MemoryStore {
            patients_table: patients_table.to_string(),
            reports_table: reports_table.to_string(),
            tables: RwLock::new(Snapshot::default()),
            snapshot: None,
        }
    }

    pub fn with_data(self, data: Snapshot) -> Self {
        MemoryStore {
            tables: RwLock::new(data),
            ..self
        }
    }

    /// Opens a store persisted at `file`, loading the existing snapshot if
    /// there is one.
    pub fn open(patients_table: &str, reports_table: &str, file: SnapshotFile) -> Result<Self, StorageError> {
        let data = file.load()?.unwrap_or_default();
        info!(
            path = %file.path().display(),
            patients = data.patients.len(),
            reports = data.daily_reports.len(),
            "Loaded ward snapshot"
        );
        Ok(MemoryStore {
            snapshot: Some(file),
            ..MemoryStore::new(patients_table, reports_table).with_data(data)
        })
    }

    /// Adds an admission row. Admissions happen outside the ward screens;
    /// this is how seed data and tests populate the store.
    pub fn insert_patient(&self, patient: Patient) -> Result<(), StorageError> {
        self.write_tables()?.patients.push(patient);
        Ok(())
    }

    pub fn insert_report(&self, report: DailyReport) -> Result<(), StorageError> {
        self.write_tables()?.daily_reports.push(report);
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Snapshot, StorageError> {
        Ok(self.read_tables()?.clone())
    }

    fn read_tables(&self) -> Result<std::sync::RwLockReadGuard<'_, Snapshot>, StorageError> {
        self.tables.read().map_err(|e| StorageError::Lock(e.to_string()))
    }

    fn write_tables(&self) -> Result<std::sync::RwLockWriteGuard<'_, Snapshot>, StorageError> {
        self.tables.write().map_err(|e| StorageError::Lock(e.to_string()))
    }

    fn check_table(&self, table: &str, expected: &str) -> Result<(), StorageError> {
        if table == expected {
            Ok(())
        } else {
            Err(StorageError::UnknownTable(table.to_string()))
        }
    }

    /// Writes `data` to the snapshot file, if any. Callers hold the write
    /// guard so saves never interleave.
    fn persist(&self, data: &Snapshot) -> Result<(), StorageError> {
        if let Some(file) = &self.snapshot {
            file.save(data)?;
            debug!(path = %file.path().display(), "Snapshot written");
        }
        Ok(())
    }
}

#[async_trait]
impl WardStore for MemoryStore {
    async fn fetch_patients(&self, query: &Query) -> Result<Vec<Patient>, StorageError> {
        self.check_table(&query.table, &self.patients_table)?;
        let mut rows: Vec<Patient> = self
            .read_tables()?
            .patients
            .iter()
            .filter(|patient| query.matches(*patient))
            .cloned()
            .collect();
        query.sort(&mut rows);
        Ok(rows)
    }

    async fn fetch_reports(&self, query: &Query) -> Result<Vec<DailyReport>, StorageError> {
        self.check_table(&query.table, &self.reports_table)?;
        let mut rows: Vec<DailyReport> = self
            .read_tables()?
            .daily_reports
            .iter()
            .filter(|report| query.matches(*report))
            .cloned()
            .collect();
        query.sort(&mut rows);
        Ok(rows)
    }

    async fn update_patients(
        &self,
        table: &str,
        filter: &Filter,
        update: &PatientUpdate,
    ) -> Result<usize, StorageError> {
        self.check_table(table, &self.patients_table)?;
        let mut tables = self.write_tables()?;

        // Staged on a copy so a failed snapshot write leaves the tables as
        // they were.
        let mut staged = tables.patients.clone();
        let mut updated = 0;
        for patient in staged.iter_mut().filter(|p| filter.matches(&**p)) {
            update.apply_to(patient);
            updated += 1;
        }
        if updated == 0 {
            return Ok(0);
        }

        if self.snapshot.is_some() {
            let next = Snapshot {
                patients: staged,
                daily_reports: tables.daily_reports.clone(),
            };
            self.persist(&next)?;
            *tables = next;
        } else {
            tables.patients = staged;
        }
        Ok(updated)
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let tables = self.write_tables()?;
        self.persist(&tables)
    }
}
