//! Patient lifecycle: the one-way Active -> Discharged transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::query::Filter;
use super::{columns, PatientStatus, PatientUpdate};

/// Notice shown for any failed required-field check.
pub const REQUIRED_FIELDS_NOTICE: &str = "Please fill in all required fields";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No patient selected")]
    NoPatientSelected,
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Unknown specialty: {0}")]
    UnknownSpecialty(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

pub fn can_transition(from: PatientStatus, to: PatientStatus) -> bool {
    matches!((from, to), (PatientStatus::Active, PatientStatus::Discharged))
}

/// Fields an operator submits on the discharge form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DischargeForm {
    #[serde(default)]
    pub discharge_date: String,
    #[serde(default)]
    pub discharge_time: String,
    #[serde(default)]
    pub note: String,
}

/// A discharge that passed the required-field checks.
#[derive(Debug, Clone, PartialEq)]
pub struct DischargeRequest {
    pub mrn: String,
    pub discharge_date: String,
    pub discharge_time: String,
    pub note: String,
}

impl DischargeRequest {
    pub fn new(mrn: Option<&str>, form: &DischargeForm) -> Result<Self, ValidationError> {
        let mrn = match mrn.map(str::trim) {
            Some(mrn) if !mrn.is_empty() => mrn,
            _ => return Err(ValidationError::NoPatientSelected),
        };
        if form.discharge_date.trim().is_empty() {
            return Err(ValidationError::MissingField("discharge_date"));
        }
        if form.discharge_time.trim().is_empty() {
            return Err(ValidationError::MissingField("discharge_time"));
        }

        Ok(DischargeRequest {
            mrn: mrn.to_string(),
            discharge_date: form.discharge_date.trim().to_string(),
            discharge_time: form.discharge_time.trim().to_string(),
            note: form.note.clone(),
        })
    }

    /// Rows the update applies to. With `guarded`, only rows still Active
    /// match, so a repeated discharge touches nothing.
    pub fn target(&self, guarded: bool) -> Filter {
        let by_mrn = Filter::eq(columns::MRN, self.mrn.as_str());
        if guarded {
            by_mrn.and(Filter::eq(columns::PATIENT_STATUS, PatientStatus::Active))
        } else {
            by_mrn
        }
    }

    pub fn update(&self, now: DateTime<Utc>) -> PatientUpdate {
        PatientUpdate {
            patient_status: Some(PatientStatus::Discharged),
            updated_at: Some(now),
            discharge_note: Some(self.note.clone()),
        }
    }
}
