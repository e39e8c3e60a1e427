//! Hosted data store (Supabase/PostgREST) client and connectivity check.
//!
//! Only the handful of REST calls the check needs are implemented: `select`
//! with a column list and a limit, and `insert` returning the created rows.

use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DatastoreSettings;

/// Value of `context.source` on the row inserted by the connectivity check
pub const CHECK_SOURCE: &str = "scenario_report_cli";

#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("data store not configured: {0} is not set")]
    NotConfigured(&'static str),

    #[error("{collection}: {message} (HTTP {status})")]
    Query {
        collection: String,
        status: u16,
        message: String,
    },

    #[error("{collection}: unexpected response: {message}")]
    Decode { collection: String, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type DatastoreResult<T> = Result<T, DatastoreError>;

/// Minimal PostgREST client authenticated with an anonymous key
#[derive(Debug, Clone)]
pub struct DatastoreClient {
    base_url: String,
    key: String,
    http: Client,
}

impl DatastoreClient {
    pub fn new(url: &str, key: &str, timeout: Duration) -> DatastoreResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http,
        })
    }

    pub fn from_settings(settings: &DatastoreSettings) -> DatastoreResult<Self> {
        let url = settings
            .url
            .as_deref()
            .ok_or(DatastoreError::NotConfigured(crate::config::ENV_SUPABASE_URL))?;
        let key = settings
            .anon_key
            .as_deref()
            .ok_or(DatastoreError::NotConfigured(crate::config::ENV_SUPABASE_ANON_KEY))?;
        Self::new(url, key, Duration::from_secs(settings.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection)
    }

    /// `SELECT columns FROM collection LIMIT limit`
    pub fn select(&self, collection: &str, columns: &str, limit: usize) -> DatastoreResult<Vec<Value>> {
        let response = self
            .http
            .get(self.endpoint(collection))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .query(&[("select", columns.to_string()), ("limit", limit.to_string())])
            .send()?;
        read_rows(collection, response)
    }

    /// Insert rows and return them as stored
    pub fn insert(&self, collection: &str, rows: &[Value]) -> DatastoreResult<Vec<Value>> {
        let response = self
            .http
            .post(self.endpoint(collection))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=representation")
            .json(rows)
            .send()?;
        read_rows(collection, response)
    }
}

fn read_rows(collection: &str, response: Response) -> DatastoreResult<Vec<Value>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        // PostgREST errors are `{ "message": ..., "code": ... }`
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        return Err(DatastoreError::Query {
            collection: collection.to_string(),
            status: status.as_u16(),
            message,
        });
    }
    response.json().map_err(|e| DatastoreError::Decode {
        collection: collection.to_string(),
        message: e.to_string(),
    })
}

/// Result of one connectivity check
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub collection: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    pub endpoint: String,
    pub checks: Vec<CheckOutcome>,
}

impl ConnectivityReport {
    pub fn all_ok(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }

    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| !c.ok).count()
    }
}

type Detail = fn(&[Value]) -> Option<String>;

fn latest_error_type(rows: &[Value]) -> Option<String> {
    let error_type = rows.first()?.get("error_type")?.as_str()?;
    Some(format!("latest error: {error_type}"))
}

fn user_list(rows: &[Value]) -> Option<String> {
    let users: Vec<String> = rows
        .iter()
        .map(|u| {
            let field = |key: &str| u.get(key).and_then(Value::as_str).unwrap_or("?").to_string();
            format!("{} ({})", field("name"), field("role"))
        })
        .collect();
    (!users.is_empty()).then(|| users.join(", "))
}

fn check<F>(name: &str, collection: &str, query: F, detail: Detail) -> CheckOutcome
where
    F: FnOnce() -> DatastoreResult<Vec<Value>>,
{
    info!("Check: {name}");
    match query() {
        Ok(rows) => {
            let detail = detail(&rows);
            info!(
                collection,
                records = rows.len(),
                "{collection} accessible: {} records found{}",
                rows.len(),
                detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
            );
            CheckOutcome {
                name: name.to_string(),
                collection: collection.to_string(),
                ok: true,
                records: Some(rows.len()),
                detail,
                error: None,
            }
        }
        Err(err) => {
            warn!(collection, "{name} failed: {err}");
            CheckOutcome {
                name: name.to_string(),
                collection: collection.to_string(),
                ok: false,
                records: None,
                detail: None,
                error: Some(err.to_string()),
            }
        }
    }
}

/// Read from each application table and insert one test error log.
///
/// Every check runs regardless of earlier failures.
pub fn run_connectivity_check(client: &DatastoreClient) -> ConnectivityReport {
    let none: Detail = |_| None;
    let mut checks = vec![
        check(
            "Fetching error logs",
            "error_logs",
            || client.select("error_logs", "*", 5),
            latest_error_type,
        ),
        check(
            "Fetching users",
            "users",
            || client.select("users", "id, email, name, role", 5),
            user_list,
        ),
        check(
            "Fetching deals",
            "deals",
            || client.select("deals", "id, status, rate", 5),
            none,
        ),
        check(
            "Fetching messages",
            "messages",
            || client.select("messages", "id, message, sender_role", 5),
            none,
        ),
    ];

    let test_row = json!({
        "error_type": "test_from_cli",
        "error_message": "Test error from scenario-report CLI",
        "user_role": "system",
        "context": { "test": true, "source": CHECK_SOURCE },
    });
    checks.push(check(
        "Inserting test error log",
        "error_logs",
        || client.insert("error_logs", &[test_row]),
        |rows| {
            let id = rows.first()?.get("id")?;
            Some(format!("created id {id}"))
        },
    ));

    ConnectivityReport {
        endpoint: client.base_url().to_string(),
        checks,
    }
}
