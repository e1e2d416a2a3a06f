//! NASA Astronomy Picture of the Day.

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::NasaConfig;
use crate::resilience::ResilientCaller;
use crate::services::{DependencyHealth, ServiceContext};
use crate::upstream::{HttpExecutor, UpstreamAuth, UpstreamError, UpstreamRequest, UpstreamResult};

const APOD_ENDPOINT: &str = "planetary/apod";
const DATE_FORMAT: &str = "%Y-%m-%d";
const MAX_RANGE_DAYS: i64 = 365;
const MAX_COUNT: u32 = 100;

/// First day APOD was published.
pub fn first_apod_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1995, 6, 16).unwrap_or(NaiveDate::MIN)
}

/// One APOD entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apod {
    pub title: String,
    pub date: String,
    pub explanation: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdurl: Option<String>,
    pub media_type: String,
    pub service_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// A single day, or a list for range and random queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApodResult {
    Single(Apod),
    Many(Vec<Apod>),
}

/// APOD query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApodQuery {
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub count: Option<u32>,
    #[serde(default = "default_thumbs")]
    pub thumbs: Option<bool>,
}

fn default_thumbs() -> Option<bool> {
    Some(true)
}

impl Default for ApodQuery {
    fn default() -> Self {
        Self {
            date: None,
            start_date: None,
            end_date: None,
            count: None,
            thumbs: default_thumbs(),
        }
    }
}

impl ApodQuery {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format(DATE_FORMAT).to_string()),
            ..Self::default()
        }
    }

    /// Check the query against `today`. Returns a message on the first problem.
    pub fn validate(&self, today: NaiveDate) -> Result<(), String> {
        let date = parse_apod_date("date", self.date.as_deref(), today)?;
        let start = parse_apod_date("start_date", self.start_date.as_deref(), today)?;
        let end = parse_apod_date("end_date", self.end_date.as_deref(), today)?;

        if date.is_some() && (start.is_some() || end.is_some()) {
            return Err("Cannot use \"date\" parameter with \"start_date\" or \"end_date\"".to_string());
        }
        if self.count.is_some() && (date.is_some() || start.is_some() || end.is_some()) {
            return Err("Cannot use \"count\" together with \"date\", \"start_date\" or \"end_date\"".to_string());
        }

        match (start, end) {
            (Some(start), Some(end)) => {
                if start >= end {
                    return Err(format!("Start date ({}) must be before end date ({})", start, end));
                }
                let days = (end - start).num_days();
                if days > MAX_RANGE_DAYS {
                    return Err(format!(
                        "Date range cannot exceed {} days. Current range: {} days",
                        MAX_RANGE_DAYS, days
                    ));
                }
            }
            (None, None) => {}
            _ => {
                return Err(
                    "Both \"start_date\" and \"end_date\" must be provided for date range queries".to_string(),
                )
            }
        }

        if let Some(count) = self.count {
            if count == 0 || count > MAX_COUNT {
                return Err(format!("count must be between 1 and {}, got {}", MAX_COUNT, count));
            }
        }

        Ok(())
    }

    /// Query parameters forwarded upstream. The API key is added by the executor.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(date) = &self.date {
            params.push(("date".to_string(), date.clone()));
        } else if let (Some(start), Some(end)) = (&self.start_date, &self.end_date) {
            params.push(("start_date".to_string(), start.clone()));
            params.push(("end_date".to_string(), end.clone()));
        } else if let Some(count) = self.count {
            params.push(("count".to_string(), count.to_string()));
        }
        if let Some(thumbs) = self.thumbs {
            params.push(("thumbs".to_string(), thumbs.to_string()));
        }
        params
    }
}

fn parse_apod_date(field: &str, value: Option<&str>, today: NaiveDate) -> Result<Option<NaiveDate>, String> {
    let Some(value) = value else {
        return Ok(None);
    };

    let looks_right = value.len() == 10 && value.as_bytes()[4] == b'-' && value.as_bytes()[7] == b'-';
    let parsed = NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .filter(|_| looks_right)
        .ok_or_else(|| format!("Invalid {} format. Expected YYYY-MM-DD, got: {}", field, value))?;

    if parsed < first_apod_date() {
        return Err(format!("{} must be on or after 1995-06-16 (first APOD). Got: {}", field, value));
    }
    if parsed > today {
        return Err(format!("{} cannot be in the future. Got: {}", field, value));
    }
    Ok(Some(parsed))
}

/// Client for the NASA APOD endpoint.
#[derive(Clone)]
pub struct NasaService {
    caller: ResilientCaller,
    base_url: String,
}

impl NasaService {
    pub const DEPENDENCY: &'static str = "nasa-apod";

    pub fn new(config: &NasaConfig, ctx: &ServiceContext) -> Result<Self, url::ParseError> {
        let executor = HttpExecutor::new(
            Self::DEPENDENCY,
            &config.base_url,
            UpstreamAuth::QueryApiKey {
                param: "api_key".to_string(),
                key: config.api_key.clone(),
            },
            ctx.pool.clone(),
        )?;

        tracing::info!(base_url = %config.base_url, "NASA service initialized");
        Ok(Self {
            caller: ctx.caller(Self::DEPENDENCY, Arc::new(executor), config.circuit),
            base_url: config.base_url.clone(),
        })
    }

    pub fn from_caller(caller: ResilientCaller, base_url: impl Into<String>) -> Self {
        Self {
            caller,
            base_url: base_url.into(),
        }
    }

    pub async fn apod(&self, query: &ApodQuery) -> UpstreamResult<ApodResult> {
        query
            .validate(Utc::now().date_naive())
            .map_err(|message| UpstreamError::request_validation(Self::DEPENDENCY, message))?;

        let mut request = UpstreamRequest::get(APOD_ENDPOINT);
        for (name, value) in query.to_params() {
            request = request.query(name, value);
        }

        let response = self.caller.call(&request).await?;
        let result = parse_apod_payload(response.body.into_json())?;
        match &result {
            ApodResult::Single(apod) => tracing::info!(date = %apod.date, "Fetched APOD"),
            ApodResult::Many(list) => tracing::info!(entries = list.len(), "Fetched APOD entries"),
        }
        Ok(result)
    }

    pub async fn health_check(&self) -> DependencyHealth {
        let started = Instant::now();
        let result = self.apod(&ApodQuery::for_date(Utc::now().date_naive())).await;
        DependencyHealth::from_probe(Self::DEPENDENCY, &self.base_url, started, result)
    }
}

/// Lists skip entries that fail to parse, but must keep at least one.
fn parse_apod_payload(payload: serde_json::Value) -> UpstreamResult<ApodResult> {
    match payload {
        serde_json::Value::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                match serde_json::from_value::<Apod>(item) {
                    Ok(apod) => entries.push(apod),
                    Err(e) => tracing::warn!(error = %e, "Skipping invalid APOD entry"),
                }
            }
            if entries.is_empty() {
                return Err(UpstreamError::response_validation(
                    NasaService::DEPENDENCY,
                    "No valid APOD data received",
                ));
            }
            Ok(ApodResult::Many(entries))
        }
        other => serde_json::from_value(other).map(ApodResult::Single).map_err(|e| {
            UpstreamError::response_validation(
                NasaService::DEPENDENCY,
                format!("Invalid APOD response format: {}", e),
            )
        }),
    }
}
