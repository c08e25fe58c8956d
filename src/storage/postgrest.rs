use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use crate::query::{Filter, Query};
use crate::ward::{DailyReport, Patient, PatientUpdate};
use super::{StorageError, WardStore};

/// Client for a hosted PostgREST endpoint (e.g. a Supabase project).
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PostgrestStore {
    /// `base_url` is the REST root, e.g. `https://project.supabase.co/rest/v1`.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        Ok(PostgrestStore {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, StorageError> {
        let params = query.to_postgrest_params();
        debug!(table = %query.table, ?params, "PostgREST select");

        let response = self
            .authorized(self.client.get(self.table_url(&query.table)))
            .query(&params)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        decode(check_status(response).await?).await
    }
}

async fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<Vec<T>, StorageError> {
    response
        .json::<Vec<T>>()
        .await
        .map_err(|e| StorageError::Decode(e.to_string()))
}

#[async_trait]
impl WardStore for PostgrestStore {
    async fn fetch_patients(&self, query: &Query) -> Result<Vec<Patient>, StorageError> {
        self.select(query).await
    }

    async fn fetch_reports(&self, query: &Query) -> Result<Vec<DailyReport>, StorageError> {
        self.select(query).await
    }

    async fn update_patients(
        &self,
        table: &str,
        filter: &Filter,
        update: &PatientUpdate,
    ) -> Result<usize, StorageError> {
        let params = filter.to_postgrest_params();
        debug!(%table, ?params, "PostgREST update");

        let response = self
            .authorized(self.client.patch(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&params)
            .json(update)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let rows: Vec<serde_json::Value> = decode(check_status(response).await?).await?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ward::{census, PatientStatus};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> PostgrestStore {
        PostgrestStore::new(&format!("{}/rest/v1/", server.uri()), "anon-key", Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_census_source_request_shape() {
        let server = MockServer::start().await;
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();

        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .and(query_param(
                "or",
                "(patient_status.eq.Active,and(patient_status.eq.Discharged,updated_at.gte.\"2024-01-01T12:00:00.000Z\"))",
            ))
            .and(query_param("order", "admission_date.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "mrn": "A100",
                    "patient_name": "Jane Roe",
                    "admission_date": "2024-01-01",
                    "admission_time": "08:30:00",
                    "patient_status": "Active",
                    "specialty": "Neurology",
                    "diagnosis": "Migraine",
                    "updated_at": null
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let query = census::source_query("patients", now, ChronoDuration::hours(48));
        let rows = store(&server).fetch_patients(&query).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mrn, "A100");
        assert_eq!(rows[0].patient_status, PatientStatus::Active);
    }

    #[tokio::test]
    async fn test_update_counts_returned_representation() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/patients"))
            .and(query_param("mrn", "eq.A100"))
            .and(query_param("patient_status", "eq.Active"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!({
                "patient_status": "Discharged",
                "discharge_note": "Stable, home care"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "mrn": "A100" }])))
            .mount(&server)
            .await;

        let update = PatientUpdate {
            patient_status: Some(PatientStatus::Discharged),
            updated_at: None,
            discharge_note: Some("Stable, home care".to_string()),
        };
        let filter = Filter::eq("mrn", "A100").and(Filter::eq("patient_status", "Active"));

        let updated = store(&server).update_patients("patients", &filter, &update).await.unwrap();
        assert_eq!(updated, 1);
    }

    #[tokio::test]
    async fn test_backend_error_status_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/daily_reports"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let result = store(&server).fetch_reports(&Query::from("daily_reports")).await;
        match result {
            Err(StorageError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_rows_are_decode_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "mrn": "A100" }])))
            .mount(&server)
            .await;

        let result = store(&server).fetch_patients(&Query::from("patients")).await;
        assert!(matches!(result, Err(StorageError::Decode(_))));
    }
}
