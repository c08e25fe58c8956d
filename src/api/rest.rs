use std::convert::Infallible;
use std::sync::Arc;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};
use crate::error::WardError;
use crate::report::{self, report_file_name};
use crate::screens::discharge::{RosterEntry, DISCHARGE_FAILED, ROSTER_FAILED, VISITS_FAILED};
use crate::screens::census::{PATIENTS_FAILED, REPORTS_FAILED};
use crate::ward::lifecycle::{DischargeForm, DischargeRequest, ValidationError};
use crate::ward::{Specialty, WardService};

pub const EXPORT_FAILED: &str = "Failed to generate PDF report";

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CensusParams {
    pub date: Option<String>,
    pub specialty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub date: Option<String>,
}

pub struct RestApi {
    service: Arc<WardService>,
    date_format: Arc<str>,
}

impl RestApi {
    pub fn new(service: Arc<WardService>, date_format: &str) -> Self {
        RestApi {
            service,
            date_format: Arc::from(date_format),
        }
    }

    pub fn routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        self.get_specialties()
            .or(self.get_active_patients())
            .or(self.get_visits())
            .or(self.post_discharge())
            .or(self.get_census())
            .or(self.get_census_pdf())
            .or(self.get_daily_reports())
    }

    fn get_specialties(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("specialties")
            .and(warp::get())
            .map(|| {
                let names: Vec<&str> = Specialty::ALL.iter().map(|s| s.as_str()).collect();
                success("Specialties", &names)
            })
    }

    fn get_active_patients(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let service = Arc::clone(&self.service);
        let date_format = Arc::clone(&self.date_format);

        warp::path!("patients" / "active")
            .and(warp::get())
            .and(warp::query::<SearchParams>())
            .and_then(move |params: SearchParams| {
                let service = Arc::clone(&service);
                let date_format = Arc::clone(&date_format);
                async move {
                    let reply = match service.list_active().await {
                        Ok(patients) => {
                            let term = params.search.unwrap_or_default();
                            let entries: Vec<RosterEntry> = patients
                                .iter()
                                .map(|p| RosterEntry::from_patient(p, &date_format))
                                .filter(|entry| entry.matches_search(&term))
                                .collect();
                            info!(count = entries.len(), "Listed active patients");
                            success("Active patients", &entries)
                        }
                        Err(e) => failure(&e, ROSTER_FAILED),
                    };
                    Ok::<Response, Infallible>(reply)
                }
            })
    }

    fn get_visits(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let service = Arc::clone(&self.service);

        warp::path!("patients" / String / "visits")
            .and(warp::get())
            .and_then(move |mrn: String| {
                let service = Arc::clone(&service);
                async move {
                    let reply = match service.list_visits_for(&mrn).await {
                        Ok(visits) => success("Previous visits", &visits),
                        Err(e) => failure(&e, VISITS_FAILED),
                    };
                    Ok::<Response, Infallible>(reply)
                }
            })
    }

    fn post_discharge(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let service = Arc::clone(&self.service);

        warp::path!("patients" / String / "discharge")
            .and(warp::post())
            .and(warp::body::json())
            .and_then(move |mrn: String, form: DischargeForm| {
                let service = Arc::clone(&service);
                async move {
                    let reply = match DischargeRequest::new(Some(&mrn), &form) {
                        Ok(request) => match service.discharge(&request).await {
                            Ok(outcome) => success(
                                &format!("Patient {} has been successfully discharged.", outcome.mrn),
                                &outcome,
                            ),
                            Err(e) => failure(&e, DISCHARGE_FAILED),
                        },
                        Err(e) => failure(&WardError::from(e), DISCHARGE_FAILED),
                    };
                    Ok::<Response, Infallible>(reply)
                }
            })
    }

    fn get_census(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let service = Arc::clone(&self.service);

        warp::path!("census")
            .and(warp::get())
            .and(warp::query::<CensusParams>())
            .and_then(move |params: CensusParams| {
                let service = Arc::clone(&service);
                async move {
                    let reply = match census_filters(&service, &params) {
                        Ok((date, specialty)) => match service.census(date, specialty).await {
                            Ok(patients) => {
                                info!(%date, count = patients.len(), "Served census");
                                success("Census", &patients)
                            }
                            Err(e) => failure(&e, PATIENTS_FAILED),
                        },
                        Err(e) => failure(&e, PATIENTS_FAILED),
                    };
                    Ok::<Response, Infallible>(reply)
                }
            })
    }

    fn get_census_pdf(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let service = Arc::clone(&self.service);

        warp::path!("census" / "report.pdf")
            .and(warp::get())
            .and(warp::query::<CensusParams>())
            .and_then(move |params: CensusParams| {
                let service = Arc::clone(&service);
                async move {
                    let reply = match census_filters(&service, &params) {
                        Ok((date, specialty)) => match service.census(date, specialty).await {
                            Ok(patients) => {
                                let document = report::render_report(&patients, date, specialty);
                                match report::write_pdf(&document) {
                                    Ok(bytes) => {
                                        let file_name = report_file_name(date, specialty);
                                        info!(file = %file_name, rows = document.rows.len(), "Exported census report");
                                        pdf_reply(file_name, bytes)
                                    }
                                    Err(e) => failure(&WardError::from(e), EXPORT_FAILED),
                                }
                            }
                            Err(e) => failure(&e, PATIENTS_FAILED),
                        },
                        Err(e) => failure(&e, EXPORT_FAILED),
                    };
                    Ok::<Response, Infallible>(reply)
                }
            })
    }

    fn get_daily_reports(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let service = Arc::clone(&self.service);

        warp::path!("reports")
            .and(warp::get())
            .and(warp::query::<ReportParams>())
            .and_then(move |params: ReportParams| {
                let service = Arc::clone(&service);
                async move {
                    let reply = match parse_date_param(&service, params.date.as_deref()) {
                        Ok(date) => match service.daily_reports(date).await {
                            Ok(reports) => success("Daily reports", &reports),
                            Err(e) => failure(&e, REPORTS_FAILED),
                        },
                        Err(e) => failure(&e, REPORTS_FAILED),
                    };
                    Ok::<Response, Infallible>(reply)
                }
            })
    }
}

/// Missing or empty date means today; missing or empty specialty means all.
fn census_filters(
    service: &WardService,
    params: &CensusParams,
) -> Result<(NaiveDate, Option<Specialty>), WardError> {
    let date = parse_date_param(service, params.date.as_deref())?;
    let specialty = match params.specialty.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => Some(name.parse::<Specialty>()?),
    };
    Ok((date, specialty))
}

fn parse_date_param(service: &WardService, raw: Option<&str>) -> Result<NaiveDate, WardError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(service.today()),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidDate(raw.to_string()).into()),
    }
}

fn success<T: Serialize + ?Sized>(message: &str, data: &T) -> Response {
    match serde_json::to_value(data) {
        Ok(value) => respond(
            StatusCode::OK,
            ApiResponse {
                status: "success".to_string(),
                message: message.to_string(),
                data: Some(value),
            },
        ),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse {
                    status: "error".to_string(),
                    message: "Failed to serialize response".to_string(),
                    data: None,
                },
            )
        }
    }
}

/// Validation errors are reported as-is; every other failure is logged and
/// collapsed into the operation's generic message.
fn failure(err: &WardError, generic: &str) -> Response {
    let (status, message) = match err {
        WardError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        WardError::NotActive(_) => (StatusCode::CONFLICT, generic.to_string()),
        WardError::NotFound(_) => (StatusCode::NOT_FOUND, generic.to_string()),
        _ => (StatusCode::BAD_GATEWAY, generic.to_string()),
    };
    if !err.is_validation() {
        error!(error = %err, "{}", generic);
    }
    respond(
        status,
        ApiResponse {
            status: "error".to_string(),
            message,
            data: None,
        },
    )
}

fn respond(status: StatusCode, body: ApiResponse) -> Response {
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn pdf_reply(file_name: String, bytes: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file_name);
    warp::reply::with_header(
        warp::reply::with_header(bytes, "content-type", "application/pdf"),
        "content-disposition",
        disposition,
    )
    .into_response()
}
