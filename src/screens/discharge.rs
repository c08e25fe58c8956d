use std::fmt::Write;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error};
use crate::error::WardError;
use crate::ward::lifecycle::{DischargeForm, DischargeRequest, REQUIRED_FIELDS_NOTICE};
use crate::ward::service::DischargeOutcome;
use crate::ward::{Patient, Visit, WardService};
use super::{Notice, RequestSequence, Ticket};

pub const ROSTER_FAILED: &str = "Failed to fetch active patients";
pub const VISITS_FAILED: &str = "Failed to fetch previous visits";
pub const DISCHARGE_FAILED: &str = "Failed to discharge patient";

/// Active patient as listed on the discharge screen. The admission date is
/// already formatted for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub mrn: String,
    pub patient_name: String,
    pub admitted: String,
    pub admission_time: Option<String>,
}

impl RosterEntry {
    pub fn from_patient(patient: &Patient, date_format: &str) -> Self {
        RosterEntry {
            mrn: patient.mrn.clone(),
            patient_name: patient.patient_name.clone(),
            admitted: display_date(patient.admission_date, date_format),
            admission_time: patient.admission_time.map(|t| t.format("%H:%M").to_string()),
        }
    }

    /// Case-insensitive match on the name, or a substring match on the MRN.
    pub fn matches_search(&self, term: &str) -> bool {
        self.patient_name.to_lowercase().contains(&term.to_lowercase()) || self.mrn.contains(term)
    }
}

/// Formats `date` with `format`, falling back to ISO when the format is
/// not valid strftime.
fn display_date(date: NaiveDate, format: &str) -> String {
    let mut out = String::new();
    match write!(out, "{}", date.format(format)) {
        Ok(()) => out,
        Err(_) => date.format("%Y-%m-%d").to_string(),
    }
}

pub struct DischargeScreen {
    date_format: String,
    roster: Vec<RosterEntry>,
    selected: Option<RosterEntry>,
    form: DischargeForm,
    visits: Vec<Visit>,
    search_term: String,
    notices: Vec<Notice>,
    roster_requests: RequestSequence,
    visit_requests: RequestSequence,
}

impl DischargeScreen {
    pub fn new(date_format: &str) -> Self {
        DischargeScreen {
            date_format: date_format.to_string(),
            roster: Vec::new(),
            selected: None,
            form: DischargeForm::default(),
            visits: Vec::new(),
            search_term: String::new(),
            notices: Vec::new(),
            roster_requests: RequestSequence::new(),
            visit_requests: RequestSequence::new(),
        }
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn selected(&self) -> Option<&RosterEntry> {
        self.selected.as_ref()
    }

    pub fn form(&self) -> &DischargeForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut DischargeForm {
        &mut self.form
    }

    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    pub fn set_search(&mut self, term: &str) {
        self.search_term = term.to_string();
    }

    /// Roster entries matching the current search term.
    pub fn filtered(&self) -> Vec<&RosterEntry> {
        self.roster
            .iter()
            .filter(|entry| entry.matches_search(&self.search_term))
            .collect()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn begin_roster(&self) -> Ticket {
        self.roster_requests.issue()
    }

    /// Applies a roster response; returns false when it was superseded.
    pub fn finish_roster(&mut self, ticket: Ticket, result: Result<Vec<Patient>, WardError>) -> bool {
        if !self.roster_requests.is_latest(ticket) {
            debug!(ticket = ticket.value(), "Dropping stale roster response");
            return false;
        }
        match result {
            Ok(patients) => {
                self.roster = patients
                    .iter()
                    .map(|patient| RosterEntry::from_patient(patient, &self.date_format))
                    .collect();
            }
            Err(e) => {
                error!(error = %e, "Error fetching active patients");
                self.notices.push(Notice::error(ROSTER_FAILED));
            }
        }
        true
    }

    pub async fn load_roster(&mut self, service: &WardService) {
        let ticket = self.begin_roster();
        let result = service.list_active().await;
        self.finish_roster(ticket, result);
    }

    /// Selects a listed patient, pre-fills the form with `now` and returns
    /// the ticket for the visit history request. `None` if `mrn` is not on
    /// the roster.
    pub fn select(&mut self, mrn: &str, now: DateTime<Utc>) -> Option<Ticket> {
        let entry = self.roster.iter().find(|entry| entry.mrn == mrn)?.clone();
        self.selected = Some(entry);
        self.form = DischargeForm {
            discharge_date: now.format("%Y-%m-%d").to_string(),
            discharge_time: now.format("%H:%M").to_string(),
            note: String::new(),
        };
        Some(self.visit_requests.issue())
    }

    pub fn finish_visits(&mut self, ticket: Ticket, result: Result<Vec<Visit>, WardError>) -> bool {
        if !self.visit_requests.is_latest(ticket) {
            debug!(ticket = ticket.value(), "Dropping stale visit history response");
            return false;
        }
        match result {
            Ok(visits) => self.visits = visits,
            Err(e) => {
                error!(error = %e, "Error fetching previous visits");
                self.notices.push(Notice::error(VISITS_FAILED));
            }
        }
        true
    }

    pub async fn select_and_load(&mut self, service: &WardService, mrn: &str) -> bool {
        let Some(ticket) = self.select(mrn, service.now()) else {
            return false;
        };
        let result = service.list_visits_for(mrn).await;
        self.finish_visits(ticket, result)
    }

    /// Submits the form for the selected patient. Missing fields fail
    /// locally without a write; on success the patient leaves the roster and
    /// the selection is cleared. On any failure local state is unchanged.
    pub async fn discharge(&mut self, service: &WardService) -> Result<DischargeOutcome, WardError> {
        let request = match DischargeRequest::new(self.selected.as_ref().map(|s| s.mrn.as_str()), &self.form) {
            Ok(request) => request,
            Err(e) => {
                self.notices.push(Notice::error(REQUIRED_FIELDS_NOTICE));
                return Err(e.into());
            }
        };

        match service.discharge(&request).await {
            Ok(outcome) => {
                let name = self
                    .selected
                    .take()
                    .map(|entry| entry.patient_name)
                    .unwrap_or_default();
                self.notices.push(Notice::success(format!(
                    "Patient {} has been successfully discharged.",
                    name
                )));
                self.roster.retain(|entry| entry.mrn != request.mrn);
                self.form = DischargeForm::default();
                self.visits.clear();
                self.visit_requests.invalidate();
                Ok(outcome)
            }
            Err(e) => {
                error!(mrn = %request.mrn, error = %e, "Discharge failed");
                self.notices.push(Notice::error(DISCHARGE_FAILED));
                Err(e)
            }
        }
    }
}
