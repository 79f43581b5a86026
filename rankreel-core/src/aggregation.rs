//! Contract with the aggregation service.
//!
//! The service answers a query for one window with a list of records such
//! as `{"sp_entity_id": "https://sp.example.org", "count_user_id": 42}`, or
//! with the single-element list `["no_results"]` when the window is empty.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, TimeZone};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

use crate::{
    error::{AggregationError, ParseError},
    ranking::Entry,
    window::TimeWindow,
};

/// Field holding the count in every record.
pub const VALUE_FIELD: &str = "count_user_id";
/// Sentinel the service sends instead of an empty list.
pub const NO_RESULTS: &str = "no_results";
/// Default state filter.
pub const DEFAULT_STATE: &str = "prodaccepted";

/// Which side of a login the ranking groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Service providers
    #[default]
    Sp,
    /// Identity providers
    Idp,
}

/// `group_by` value sent to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    SpId,
    IdpId,
}

impl Provider {
    pub fn group_by(self) -> GroupBy {
        match self {
            Provider::Sp => GroupBy::SpId,
            Provider::Idp => GroupBy::IdpId,
        }
    }

    /// Record field carrying the grouping key.
    pub fn key_field(self) -> &'static str {
        self.group_by().key_field()
    }
}

impl GroupBy {
    pub fn key_field(self) -> &'static str {
        match self {
            GroupBy::SpId => "sp_entity_id",
            GroupBy::IdpId => "idp_entity_id",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Sp => f.write_str("sp"),
            Provider::Idp => f.write_str("idp"),
        }
    }
}

impl FromStr for Provider {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sp" => Ok(Provider::Sp),
            "idp" => Ok(Provider::Idp),
            other => Err(ParseError::UnknownProvider(other.to_string())),
        }
    }
}

/// Query for one window.
///
/// `from`/`to` always carry the explicit bounds; `period` carries the
/// window's period code when it has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
    pub include_unique: bool,
    pub group_by: GroupBy,
    pub state: String,
}

impl AggregationRequest {
    pub fn for_window<Tz: TimeZone>(
        window: &TimeWindow<Tz>,
        group_by: GroupBy,
        state: &str,
        include_unique: bool,
    ) -> Self {
        AggregationRequest {
            period: window.period_code(),
            from: fixed(&window.start),
            to: fixed(&window.end),
            include_unique,
            group_by,
            state: state.to_string(),
        }
    }

    /// Short label for logs: the period code, or the start instant.
    pub fn label(&self) -> String {
        match &self.period {
            Some(code) => code.clone(),
            None => self.from.to_rfc3339(),
        }
    }
}

pub(crate) fn fixed<Tz: TimeZone>(instant: &DateTime<Tz>) -> DateTime<FixedOffset> {
    let offset = instant.offset().fix();
    instant.with_timezone(&offset)
}

/// One raw record as returned by the service.
pub type Record = serde_json::Map<String, Value>;

/// Outcome of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// The service had nothing for this window.
    NoResults,
    Records(Vec<Record>),
}

impl Aggregation {
    /// Interpret a decoded response body.
    pub fn from_json(body: Value) -> Result<Self, AggregationError> {
        let items = match body {
            Value::Array(items) => items,
            other => {
                return Err(AggregationError::ResponseParse(format!(
                    "expected a list of records, got {}",
                    kind(&other)
                )))
            }
        };
        if items.len() == 1 && items[0].as_str() == Some(NO_RESULTS) {
            return Ok(Aggregation::NoResults);
        }
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(record) => records.push(record),
                other => warn!("Skipping non-record item in response: {}", other),
            }
        }
        Ok(Aggregation::Records(records))
    }

    /// Counts per key, reading the key from `key_field`.
    ///
    /// Records without a string key or a non-negative numeric count are
    /// skipped with a warning.
    pub fn counts(&self, key_field: &str) -> Vec<Entry> {
        let records = match self {
            Aggregation::NoResults => return Vec::new(),
            Aggregation::Records(records) => records,
        };
        let mut counts = Vec::with_capacity(records.len());
        for record in records {
            let key = match record.get(key_field).and_then(Value::as_str) {
                Some(key) => key,
                None => {
                    warn!("Record without {}: {:?}", key_field, record);
                    continue;
                }
            };
            let value = match record.get(VALUE_FIELD).and_then(count_of) {
                Some(value) => value,
                None => {
                    warn!("Record for {} has no usable {}", key, VALUE_FIELD);
                    continue;
                }
            };
            counts.push(Entry::new(key, value));
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Aggregation::NoResults => true,
            Aggregation::Records(records) => records.is_empty(),
        }
    }
}

fn count_of(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f.round() as u64)
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Build a record the way the service shapes them.
pub fn record(key_field: &str, key: &str, count: u64) -> Record {
    let mut record = Record::new();
    record.insert(key_field.to_string(), Value::from(key));
    record.insert(VALUE_FIELD.to_string(), Value::from(count));
    record
}

/// The aggregation service.
///
/// Implementations may talk HTTP (`http::HttpAggregationClient`) or be
/// scripted for tests (`mock::MockAggregationClient`).
#[async_trait]
pub trait AggregationClient: Send + Sync {
    async fn fetch(&self, request: &AggregationRequest) -> Result<Aggregation, AggregationError>;
}
