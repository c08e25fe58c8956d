use std::sync::Arc;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};
use crate::error::WardError;
use crate::query::{Filter, Query};
use crate::storage::WardStore;
use super::census::{self, DEFAULT_VISIBILITY_WINDOW_HOURS};
use super::lifecycle::DischargeRequest;
use super::{columns, Clock, DailyReport, Patient, PatientStatus, Specialty, Visit};

#[derive(Debug, Clone)]
pub struct WardSettings {
    pub patients_table: String,
    pub reports_table: String,
    pub visibility_window: Duration,
    /// Only transition rows that are still Active.
    pub guard_discharge: bool,
}

impl Default for WardSettings {
    fn default() -> Self {
        WardSettings {
            patients_table: "patients".to_string(),
            reports_table: "daily_reports".to_string(),
            visibility_window: Duration::hours(DEFAULT_VISIBILITY_WINDOW_HOURS),
            guard_discharge: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DischargeOutcome {
    pub mrn: String,
    pub rows_updated: usize,
    pub discharged_at: DateTime<Utc>,
}

/// Ward operations, each a single round trip to the store.
pub struct WardService {
    store: Arc<dyn WardStore>,
    clock: Arc<dyn Clock>,
    settings: WardSettings,
}

impl WardService {
    pub fn new(store: Arc<dyn WardStore>, clock: Arc<dyn Clock>, settings: WardSettings) -> Self {
        WardService { store, clock, settings }
    }

    pub fn settings(&self) -> &WardSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Active patients, most recent admission first.
    pub async fn list_active(&self) -> Result<Vec<Patient>, WardError> {
        let query = Query::from(&self.settings.patients_table)
            .filter(Filter::eq(columns::PATIENT_STATUS, PatientStatus::Active))
            .order_by(columns::ADMISSION_DATE, false);
        Ok(self.store.fetch_patients(&query).await?)
    }

    /// Every admission row sharing `mrn`, newest first.
    pub async fn list_visits_for(&self, mrn: &str) -> Result<Vec<Visit>, WardError> {
        let query = Query::from(&self.settings.patients_table)
            .filter(Filter::eq(columns::MRN, mrn))
            .order_by(columns::ADMISSION_DATE, false);
        let rows = self.store.fetch_patients(&query).await?;
        Ok(rows.iter().map(Visit::from).collect())
    }

    /// Active patients plus those discharged within the visibility window,
    /// evaluated against the clock at call time.
    pub async fn census_source(&self) -> Result<Vec<Patient>, WardError> {
        let query = census::source_query(
            &self.settings.patients_table,
            self.now(),
            self.settings.visibility_window,
        );
        Ok(self.store.fetch_patients(&query).await?)
    }

    pub async fn census(&self, date: NaiveDate, specialty: Option<Specialty>) -> Result<Vec<Patient>, WardError> {
        let source = self.census_source().await?;
        Ok(census::filter_census(&source, date, specialty))
    }

    pub async fn daily_reports(&self, date: NaiveDate) -> Result<Vec<DailyReport>, WardError> {
        let query = Query::from(&self.settings.reports_table)
            .filter(Filter::eq(columns::REPORT_DATE, date))
            .order_by(columns::CREATED_AT, false);
        Ok(self.store.fetch_reports(&query).await?)
    }

    pub async fn discharge(&self, request: &DischargeRequest) -> Result<DischargeOutcome, WardError> {
        let now = self.now();
        let filter = request.target(self.settings.guard_discharge);
        let rows_updated = self
            .store
            .update_patients(&self.settings.patients_table, &filter, &request.update(now))
            .await?;

        if rows_updated == 0 {
            warn!(mrn = %request.mrn, guarded = self.settings.guard_discharge, "Discharge matched no rows");
            return Err(if self.settings.guard_discharge {
                WardError::NotActive(request.mrn.clone())
            } else {
                WardError::NotFound(request.mrn.clone())
            });
        }

        info!(
            mrn = %request.mrn,
            discharge_date = %request.discharge_date,
            discharge_time = %request.discharge_time,
            rows_updated,
            "Patient discharged"
        );
        Ok(DischargeOutcome {
            mrn: request.mrn.clone(),
            rows_updated,
            discharged_at: now,
        })
    }

    pub async fn flush(&self) -> Result<(), WardError> {
        Ok(self.store.flush().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::ward::census::tests::patient;
    use crate::ward::lifecycle::DischargeForm;
    use crate::ward::FixedClock;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn fixture(guard: bool) -> (Arc<MemoryStore>, Arc<FixedClock>, WardService) {
        let store = Arc::new(MemoryStore::new("patients", "daily_reports"));
        let mut a100 = patient("A100", 1, Specialty::Neurology, PatientStatus::Active);
        a100.patient_name = "Jane Roe".to_string();
        store.insert_patient(a100).unwrap();
        store.insert_patient(patient("B200", 2, Specialty::Hematology, PatientStatus::Active)).unwrap();

        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap()));
        let settings = WardSettings {
            guard_discharge: guard,
            ..WardSettings::default()
        };
        let service = WardService::new(store.clone(), clock.clone(), settings);
        (store, clock, service)
    }

    fn request(mrn: &str, note: &str) -> DischargeRequest {
        let form = DischargeForm {
            discharge_date: "2024-01-03".to_string(),
            discharge_time: "10:00".to_string(),
            note: note.to_string(),
        };
        DischargeRequest::new(Some(mrn), &form).unwrap()
    }

    fn mrns(patients: &[Patient]) -> Vec<&str> {
        patients.iter().map(|p| p.mrn.as_str()).collect()
    }

    #[tokio::test]
    async fn test_discharge_scenario() {
        let (store, clock, service) = fixture(true);

        let outcome = service.discharge(&request("A100", "Stable, home care")).await.unwrap();
        assert_eq!(outcome.rows_updated, 1);
        assert_eq!(outcome.discharged_at, clock.now());

        let data = store.snapshot().unwrap();
        let a100 = data.patients.iter().find(|p| p.mrn == "A100").unwrap();
        assert_eq!(a100.patient_status, PatientStatus::Discharged);
        assert_eq!(a100.discharge_note.as_deref(), Some("Stable, home care"));
        assert_eq!(a100.updated_at, Some(clock.now()));

        assert_eq!(mrns(&service.list_active().await.unwrap()), vec!["B200"]);
    }

    #[tokio::test]
    async fn test_discharged_patient_leaves_census_after_window() {
        let (_store, clock, service) = fixture(true);
        let admitted = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        service.discharge(&request("A100", "")).await.unwrap();
        assert_eq!(mrns(&service.census(admitted, None).await.unwrap()), vec!["A100"]);

        clock.advance(Duration::hours(48));
        assert_eq!(mrns(&service.census(admitted, None).await.unwrap()), vec!["A100"]);

        clock.advance(Duration::seconds(1));
        assert!(service.census(admitted, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guarded_second_discharge_is_rejected() {
        let (store, clock, service) = fixture(true);

        service.discharge(&request("A100", "first")).await.unwrap();
        let first = store.snapshot().unwrap();

        clock.advance(Duration::hours(1));
        let result = service.discharge(&request("A100", "second")).await;
        assert!(matches!(result, Err(WardError::NotActive(mrn)) if mrn == "A100"));
        assert_eq!(store.snapshot().unwrap(), first);
    }

    #[tokio::test]
    async fn test_unguarded_second_discharge_overwrites_note_and_time() {
        let (store, clock, service) = fixture(false);

        service.discharge(&request("A100", "first")).await.unwrap();
        clock.advance(Duration::hours(1));
        service.discharge(&request("A100", "second")).await.unwrap();

        let data = store.snapshot().unwrap();
        let a100 = data.patients.iter().find(|p| p.mrn == "A100").unwrap();
        assert_eq!(a100.patient_status, PatientStatus::Discharged);
        assert_eq!(a100.discharge_note.as_deref(), Some("second"));
        assert_eq!(a100.updated_at, Some(clock.now()));
        assert_eq!(data.patients.len(), 2);
    }

    #[tokio::test]
    async fn test_unguarded_unknown_mrn_is_not_found() {
        let (_store, _clock, service) = fixture(false);
        let result = service.discharge(&request("Z999", "")).await;
        assert!(matches!(result, Err(WardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_visits_share_mrn_newest_first() {
        let (store, _clock, service) = fixture(true);
        let mut earlier = patient("A100", 1, Specialty::Neurology, PatientStatus::Discharged);
        earlier.admission_date = NaiveDate::from_ymd_opt(2023, 6, 12).unwrap();
        earlier.updated_at = Some(Utc.with_ymd_and_hms(2023, 6, 20, 9, 0, 0).unwrap());
        store.insert_patient(earlier).unwrap();

        let visits = service.list_visits_for("A100").await.unwrap();
        let dates: Vec<String> = visits.iter().map(|v| v.admission_date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2023-06-12"]);
        assert!(visits[1].updated_at.is_some());
    }

    #[tokio::test]
    async fn test_guard_leaves_previous_visits_untouched() {
        let (store, _clock, service) = fixture(true);
        let mut earlier = patient("A100", 1, Specialty::Neurology, PatientStatus::Discharged);
        earlier.admission_date = NaiveDate::from_ymd_opt(2023, 6, 12).unwrap();
        earlier.discharge_note = Some("2023 visit".to_string());
        store.insert_patient(earlier).unwrap();

        let outcome = service.discharge(&request("A100", "now")).await.unwrap();
        assert_eq!(outcome.rows_updated, 1);

        let data = store.snapshot().unwrap();
        let notes: Vec<Option<&str>> = data
            .patients
            .iter()
            .filter(|p| p.mrn == "A100")
            .map(|p| p.discharge_note.as_deref())
            .collect();
        assert_eq!(notes, vec![Some("now"), Some("2023 visit")]);
    }

    #[tokio::test]
    async fn test_census_specialty_scenario() {
        let store = Arc::new(MemoryStore::new("patients", "daily_reports"));
        for p in [
            patient("N1", 1, Specialty::Neurology, PatientStatus::Active),
            patient("H1", 1, Specialty::Hematology, PatientStatus::Active),
            patient("N2", 2, Specialty::Neurology, PatientStatus::Active),
            patient("N3", 1, Specialty::Neurology, PatientStatus::Active),
            patient("R1", 3, Specialty::Rheumatology, PatientStatus::Active),
        ] {
            store.insert_patient(p).unwrap();
        }
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap()));
        let service = WardService::new(store, clock, WardSettings::default());
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let neurology = service.census(day, Some(Specialty::Neurology)).await.unwrap();
        assert_eq!(mrns(&neurology), vec!["N1", "N3"]);

        let all = service.census(day, None).await.unwrap();
        assert!(neurology.iter().all(|p| all.contains(p)));

        let empty_day = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert!(service.census(empty_day, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_daily_reports_for_date_newest_first() {
        let (store, _clock, service) = fixture(true);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let next_day = day.succ_opt().unwrap();
        for (id, date, hour) in [
            ("r1", day, Some(8)),
            ("r0", day, None),
            ("r2", day, Some(17)),
            ("r3", next_day, Some(9)),
        ] {
            store
                .insert_report(DailyReport {
                    report_id: id.to_string(),
                    patient_id: "A100".to_string(),
                    report_date: date,
                    report_content: format!("Report {}", id),
                    created_at: hour.map(|h| date.and_hms_opt(h, 0, 0).unwrap().and_utc()),
                })
                .unwrap();
        }

        let reports = service.daily_reports(day).await.unwrap();
        let ids: Vec<&str> = reports.iter().map(|r| r.report_id.as_str()).collect();
        assert_eq!(ids, vec!["r0", "r2", "r1"]);
    }
}
