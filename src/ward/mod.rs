//! Ward domain types and operations
//!
//! This module contains the patient and report records the ward screens
//! read and write, plus the lifecycle and census rules built on them.

pub mod census;
pub mod clock;
pub mod lifecycle;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use service::{WardService, WardSettings};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::query::{Row, Value};
use lifecycle::{can_transition, ValidationError};

/// Column names shared by the stores and the query builder.
pub mod columns {
    pub const MRN: &str = "mrn";
    pub const PATIENT_NAME: &str = "patient_name";
    pub const ADMISSION_DATE: &str = "admission_date";
    pub const ADMISSION_TIME: &str = "admission_time";
    pub const PATIENT_STATUS: &str = "patient_status";
    pub const SPECIALTY: &str = "specialty";
    pub const DIAGNOSIS: &str = "diagnosis";
    pub const UPDATED_AT: &str = "updated_at";
    pub const DISCHARGE_NOTE: &str = "discharge_note";

    pub const REPORT_ID: &str = "report_id";
    pub const PATIENT_ID: &str = "patient_id";
    pub const REPORT_DATE: &str = "report_date";
    pub const REPORT_CONTENT: &str = "report_content";
    pub const CREATED_AT: &str = "created_at";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatientStatus {
    Active,
    Discharged,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "Active",
            PatientStatus::Discharged => "Discharged",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PatientStatus> for Value {
    fn from(status: PatientStatus) -> Self {
        Value::Text(status.as_str().to_string())
    }
}

/// Specialties a ward admission can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Specialty {
    #[serde(rename = "General Internal Medicine")]
    GeneralInternalMedicine,
    #[serde(rename = "Respiratory Medicine")]
    RespiratoryMedicine,
    #[serde(rename = "Infectious Diseases")]
    InfectiousDiseases,
    #[serde(rename = "Neurology")]
    Neurology,
    #[serde(rename = "Gastroenterology")]
    Gastroenterology,
    #[serde(rename = "Rheumatology")]
    Rheumatology,
    #[serde(rename = "Hematology")]
    Hematology,
    #[serde(rename = "Thrombosis Medicine")]
    ThrombosisMedicine,
    #[serde(rename = "Immunology & Allergy")]
    ImmunologyAllergy,
    #[serde(rename = "Safety Admission")]
    SafetyAdmission,
}

impl Specialty {
    pub const ALL: [Specialty; 10] = [
        Specialty::GeneralInternalMedicine,
        Specialty::RespiratoryMedicine,
        Specialty::InfectiousDiseases,
        Specialty::Neurology,
        Specialty::Gastroenterology,
        Specialty::Rheumatology,
        Specialty::Hematology,
        Specialty::ThrombosisMedicine,
        Specialty::ImmunologyAllergy,
        Specialty::SafetyAdmission,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialty::GeneralInternalMedicine => "General Internal Medicine",
            Specialty::RespiratoryMedicine => "Respiratory Medicine",
            Specialty::InfectiousDiseases => "Infectious Diseases",
            Specialty::Neurology => "Neurology",
            Specialty::Gastroenterology => "Gastroenterology",
            Specialty::Rheumatology => "Rheumatology",
            Specialty::Hematology => "Hematology",
            Specialty::ThrombosisMedicine => "Thrombosis Medicine",
            Specialty::ImmunologyAllergy => "Immunology & Allergy",
            Specialty::SafetyAdmission => "Safety Admission",
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Specialty::ALL
            .iter()
            .copied()
            .find(|specialty| specialty.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownSpecialty(s.to_string()))
    }
}

/// One admission row. Several rows may share an MRN, one per visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub mrn: String,
    #[serde(default)]
    pub patient_name: String,
    #[serde(deserialize_with = "flexible::date")]
    pub admission_date: NaiveDate,
    #[serde(default, deserialize_with = "flexible::optional_time")]
    pub admission_time: Option<NaiveTime>,
    pub patient_status: PatientStatus,
    // Kept as text: the backend owns the column and may hold values outside
    // the specialty list.
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default, deserialize_with = "flexible::optional_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub discharge_note: Option<String>,
}

impl Patient {
    pub fn is_active(&self) -> bool {
        self.patient_status == PatientStatus::Active
    }
}

impl Row for Patient {
    fn column(&self, name: &str) -> Value {
        match name {
            columns::MRN => Value::from(self.mrn.as_str()),
            columns::PATIENT_NAME => Value::from(self.patient_name.as_str()),
            columns::ADMISSION_DATE => Value::from(self.admission_date),
            columns::ADMISSION_TIME => Value::from(
                self.admission_time.map(|t| t.format("%H:%M:%S").to_string()),
            ),
            columns::PATIENT_STATUS => Value::from(self.patient_status),
            columns::SPECIALTY => Value::from(self.specialty.as_str()),
            columns::DIAGNOSIS => Value::from(self.diagnosis.as_str()),
            columns::UPDATED_AT => Value::from(self.updated_at),
            columns::DISCHARGE_NOTE => Value::from(self.discharge_note.clone()),
            _ => Value::Null,
        }
    }
}

/// Partial-column write. Only `Some` fields are sent to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_status: Option<PatientStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discharge_note: Option<String>,
}

impl PatientUpdate {
    /// Writes the `Some` fields. A status change that the lifecycle does not
    /// allow, such as reactivating a discharged patient, is skipped.
    pub fn apply_to(&self, patient: &mut Patient) {
        if let Some(status) = self.patient_status {
            if can_transition(patient.patient_status, status) {
                patient.patient_status = status;
            }
        }
        if let Some(updated_at) = self.updated_at {
            patient.updated_at = Some(updated_at);
        }
        if let Some(note) = &self.discharge_note {
            patient.discharge_note = Some(note.clone());
        }
    }
}

/// Admission history entry shown next to the discharge form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub mrn: String,
    pub admission_date: NaiveDate,
    pub admission_time: Option<NaiveTime>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Patient> for Visit {
    fn from(patient: &Patient) -> Self {
        Visit {
            mrn: patient.mrn.clone(),
            admission_date: patient.admission_date,
            admission_time: patient.admission_time,
            updated_at: patient.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    #[serde(deserialize_with = "flexible::string_or_number")]
    pub report_id: String,
    #[serde(deserialize_with = "flexible::string_or_number")]
    pub patient_id: String,
    #[serde(deserialize_with = "flexible::date")]
    pub report_date: NaiveDate,
    #[serde(default)]
    pub report_content: String,
    #[serde(default, deserialize_with = "flexible::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Row for DailyReport {
    fn column(&self, name: &str) -> Value {
        match name {
            columns::REPORT_ID => Value::from(self.report_id.as_str()),
            columns::PATIENT_ID => Value::from(self.patient_id.as_str()),
            columns::REPORT_DATE => Value::from(self.report_date),
            columns::REPORT_CONTENT => Value::from(self.report_content.as_str()),
            columns::CREATED_AT => Value::from(self.created_at),
            _ => Value::Null,
        }
    }
}

/// Lenient decoding for columns a hosted database may return in several
/// shapes (plain dates vs timestamps, naive vs zoned timestamps).
mod flexible {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use serde::de::{self, Deserializer};
    use serde::Deserialize;

    pub fn parse_date(raw: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
    }

    pub fn parse_time(raw: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
    }

    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
                    .map(|naive| naive.and_utc())
                    .ok()
            })
    }

    pub fn date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date: {}", raw)))
    }

    pub fn optional_time<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.is_empty() => parse_time(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid time: {}", raw))),
            _ => Ok(None),
        }
    }

    pub fn optional_timestamp<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.is_empty() => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw))),
            _ => Ok(None),
        }
    }

    pub fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            other => Err(de::Error::custom(format!("expected string or number, got {}", other))),
        }
    }
}
