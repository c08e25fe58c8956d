use chrono::NaiveDate;
use tracing::{debug, error};
use crate::error::WardError;
use crate::report::{self, ReportDocument};
use crate::ward::census::filter_census;
use crate::ward::{DailyReport, Patient, Specialty, WardService};
use super::{Notice, RequestSequence, Ticket};

pub const PATIENTS_FAILED: &str = "Failed to fetch patients";
pub const REPORTS_FAILED: &str = "Failed to fetch daily reports";

/// Daily census screen: the visible roster is fetched once and re-filtered
/// locally whenever the date or specialty changes.
pub struct CensusScreen {
    date: NaiveDate,
    specialty: Option<Specialty>,
    source: Vec<Patient>,
    census: Vec<Patient>,
    reports: Vec<DailyReport>,
    loading: bool,
    notices: Vec<Notice>,
    roster_requests: RequestSequence,
    report_requests: RequestSequence,
}

impl CensusScreen {
    pub fn new(date: NaiveDate) -> Self {
        CensusScreen {
            date,
            specialty: None,
            source: Vec::new(),
            census: Vec::new(),
            reports: Vec::new(),
            loading: true,
            notices: Vec::new(),
            roster_requests: RequestSequence::new(),
            report_requests: RequestSequence::new(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn specialty(&self) -> Option<Specialty> {
        self.specialty
    }

    pub fn census(&self) -> &[Patient] {
        &self.census
    }

    pub fn reports(&self) -> &[DailyReport] {
        &self.reports
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Changes the day. Returns the ticket for the day's report request,
    /// which supersedes any request for the previous day.
    pub fn set_date(&mut self, date: NaiveDate) -> Ticket {
        self.date = date;
        self.refilter();
        self.report_requests.issue()
    }

    pub fn set_specialty(&mut self, specialty: Option<Specialty>) {
        self.specialty = specialty;
        self.refilter();
    }

    fn refilter(&mut self) {
        self.census = filter_census(&self.source, self.date, self.specialty);
    }

    pub fn begin_roster(&mut self) -> Ticket {
        self.loading = true;
        self.roster_requests.issue()
    }

    pub fn finish_roster(&mut self, ticket: Ticket, result: Result<Vec<Patient>, WardError>) -> bool {
        if !self.roster_requests.is_latest(ticket) {
            debug!(ticket = ticket.value(), "Dropping stale census roster response");
            return false;
        }
        match result {
            Ok(patients) => {
                self.source = patients;
                self.refilter();
            }
            Err(e) => {
                error!(error = %e, "Error fetching patients");
                self.notices.push(Notice::error(PATIENTS_FAILED));
            }
        }
        self.loading = false;
        true
    }

    pub fn begin_reports(&self) -> Ticket {
        self.report_requests.issue()
    }

    pub fn finish_reports(&mut self, ticket: Ticket, result: Result<Vec<DailyReport>, WardError>) -> bool {
        if !self.report_requests.is_latest(ticket) {
            debug!(ticket = ticket.value(), "Dropping stale daily report response");
            return false;
        }
        match result {
            Ok(reports) => self.reports = reports,
            Err(e) => {
                error!(error = %e, "Error fetching daily reports");
                self.notices.push(Notice::error(REPORTS_FAILED));
            }
        }
        true
    }

    pub async fn load_roster(&mut self, service: &WardService) {
        let ticket = self.begin_roster();
        let result = service.census_source().await;
        self.finish_roster(ticket, result);
    }

    pub async fn load_reports(&mut self, service: &WardService) {
        let ticket = self.begin_reports();
        let result = service.daily_reports(self.date).await;
        self.finish_reports(ticket, result);
    }

    pub async fn change_date(&mut self, service: &WardService, date: NaiveDate) {
        let ticket = self.set_date(date);
        let result = service.daily_reports(date).await;
        self.finish_reports(ticket, result);
    }

    pub async fn refresh(&mut self, service: &WardService) {
        self.load_roster(service).await;
        self.load_reports(service).await;
    }

    pub fn document(&self) -> ReportDocument {
        report::render_report(&self.census, self.date, self.specialty)
    }

    /// PDF of the current census with its download file name.
    pub fn export_pdf(&self) -> Result<(String, Vec<u8>), WardError> {
        let bytes = report::write_pdf(&self.document())?;
        Ok((report::report_file_name(self.date, self.specialty), bytes))
    }
}
