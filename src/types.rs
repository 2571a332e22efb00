// Wire contracts shared with the travel search backend.
// Field names and optionality must match the backend JSON exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// Open key/value mapping used for preferences, metadata and stored results
pub type JsonMap = Map<String, Value>;

// The backend serializes empty slices and maps as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Query sent to `POST /api/v1/travel/search`.
///
/// Nothing is validated client-side; the backend rejects an empty destination.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl SearchRequest {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn with_dates(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_preference(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.preferences
            .get_or_insert_with(JsonMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Result of a travel search as returned by the backend.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub search_id: i64,
    pub destination: String,
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendations: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flights: Option<Vec<Flight>>,
    pub estimated_cost: f64,
    pub created_at: String,
}

impl SearchResponse {
    // None when the backend timestamp is not RFC 3339
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}

// A suggested hotel, activity, restaurant, ... for the destination
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: i64,
    #[serde(rename = "type")]
    pub category: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonMap>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub temperature: f64,
    pub description: String,
    pub humidity: i32,
    pub wind_speed: f64,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<DayForecast>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayForecast {
    pub date: String,
    pub temp_min: f64,
    pub temp_max: f64,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub flight_number: String,
    pub airline: String,
    // Airport codes
    pub departure: String,
    pub arrival: String,
    pub depart_time: String,
    pub arrive_time: String,
    pub duration: String,
    pub price: f64,
    pub stops: i32,
}

/// A search persisted server-side, as listed by `GET /api/v1/travel/history`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub user_id: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub budget: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preferences: JsonMap,
    // Opaque to the client
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: JsonMap,
    pub created_at: String,
    pub updated_at: String,
}

impl HistoryEntry {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.updated_at)
    }
}

/// Recognized shape of the `/health` payload.
///
/// The health endpoint is treated as opaque JSON; this is a lenient view over it.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    #[serde(default)]
    pub services: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub time: String,
}

impl HealthCheckResponse {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

// Error body the backend sends alongside non-2xx statuses
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Value,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: i32,
}

impl ErrorResponse {
    // Prefers `message`, then a textual `error` field
    pub fn best_message(&self) -> Option<String> {
        if !self.message.trim().is_empty() {
            return Some(self.message.clone());
        }
        match &self.error {
            Value::String(error) if !error.trim().is_empty() => Some(error.clone()),
            _ => None,
        }
    }
}
