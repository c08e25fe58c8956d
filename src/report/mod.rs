//! Daily patient report export
//!
//! `render_report` turns a census into a layout-agnostic table document;
//! `pdf::write_pdf` lays that document out on A4 pages.

pub mod pdf;

pub use pdf::write_pdf;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use crate::ward::{Patient, Specialty};

pub const REPORT_TITLE: &str = "Daily Patient Report";
pub const REPORT_COLUMNS: [&str; 5] = ["MRN", "Patient Name", "Specialty", "Status", "Diagnosis"];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub subtitles: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Builds the report table, one row per patient in input order.
pub fn render_report(patients: &[Patient], date: NaiveDate, specialty: Option<Specialty>) -> ReportDocument {
    let mut subtitles = vec![format!("Date: {}", date.format("%Y-%m-%d"))];
    if let Some(specialty) = specialty {
        subtitles.push(format!("Specialty: {}", specialty));
    }

    let rows = patients
        .iter()
        .map(|patient| {
            vec![
                patient.mrn.clone(),
                patient.patient_name.clone(),
                patient.specialty.clone(),
                patient.patient_status.to_string(),
                patient.diagnosis.clone(),
            ]
        })
        .collect();

    ReportDocument {
        title: REPORT_TITLE.to_string(),
        subtitles,
        columns: REPORT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

pub fn report_file_name(date: NaiveDate, specialty: Option<Specialty>) -> String {
    match specialty {
        Some(specialty) => format!("daily_report_{}_{}.pdf", date.format("%Y-%m-%d"), specialty),
        None => format!("daily_report_{}.pdf", date.format("%Y-%m-%d")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ward::census::tests::patient;
    use crate::ward::PatientStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_layout() {
        let patients = vec![
            patient("N1", 1, Specialty::Neurology, PatientStatus::Active),
            patient("N3", 1, Specialty::Neurology, PatientStatus::Discharged),
        ];
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let document = render_report(&patients, day, Some(Specialty::Neurology));

        assert_eq!(document.title, "Daily Patient Report");
        assert_eq!(document.subtitles, vec!["Date: 2024-01-01", "Specialty: Neurology"]);
        assert_eq!(document.columns, vec!["MRN", "Patient Name", "Specialty", "Status", "Diagnosis"]);
        assert_eq!(
            document.rows,
            vec![
                vec!["N1", "Patient N1", "Neurology", "Active", "Observation"],
                vec!["N3", "Patient N3", "Neurology", "Discharged", "Observation"],
            ]
        );
    }

    #[test]
    fn test_report_without_specialty_or_rows() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let document = render_report(&[], day, None);

        assert_eq!(document.subtitles, vec!["Date: 2024-01-01"]);
        assert!(document.rows.is_empty());
        assert_eq!(render_report(&[], day, None), document);
    }

    #[test]
    fn test_file_names() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(report_file_name(day, None), "daily_report_2024-01-01.pdf");
        assert_eq!(
            report_file_name(day, Some(Specialty::RespiratoryMedicine)),
            "daily_report_2024-01-01_Respiratory Medicine.pdf"
        );
    }
}
