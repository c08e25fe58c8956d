//! Daily census rules
//!
//! The census source is every active patient plus those discharged within
//! the visibility window. A census for a day narrows that source to the
//! admissions on that calendar day and, optionally, one specialty.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use crate::query::{Filter, Query};
use super::{columns, Patient, PatientStatus, Specialty};

pub const DEFAULT_VISIBILITY_WINDOW_HOURS: i64 = 48;

/// `Active OR (Discharged AND updated_at >= now - window)`
pub fn visibility_filter(now: DateTime<Utc>, window: Duration) -> Filter {
    Filter::eq(columns::PATIENT_STATUS, PatientStatus::Active).or(
        Filter::eq(columns::PATIENT_STATUS, PatientStatus::Discharged)
            .and(Filter::gte(columns::UPDATED_AT, now - window)),
    )
}

pub fn source_query(table: &str, now: DateTime<Utc>, window: Duration) -> Query {
    Query::from(table)
        .filter(visibility_filter(now, window))
        .order_by(columns::ADMISSION_DATE, false)
}

pub fn admitted_on(patient: &Patient, date: NaiveDate, specialty: Option<Specialty>) -> bool {
    patient.admission_date == date
        && specialty.map_or(true, |s| patient.specialty == s.as_str())
}

/// Keeps source order; no tie breaking.
pub fn filter_census(patients: &[Patient], date: NaiveDate, specialty: Option<Specialty>) -> Vec<Patient> {
    patients
        .iter()
        .filter(|patient| admitted_on(patient, date, specialty))
        .cloned()
        .collect()
}
