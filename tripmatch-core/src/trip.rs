//! Trip entity and the validation that turns raw input into a storable trip.
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{HostId, TripId};

/// Trip status. `Cancelled` is terminal; a trip is never reactivated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Active,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "active",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TripStatus::Active),
            "cancelled" => Ok(TripStatus::Cancelled),
            other => Err(format!("unknown trip status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: TripId,
    pub host_id: HostId,
    pub from_country: String,
    pub from_state: Option<String>,
    pub from_city: String,
    pub to_country: String,
    pub to_city: String,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_date: Option<NaiveDate>,
    pub arrival_time: Option<NaiveTime>,
    pub airline: Option<String>,
    pub flight_number: Option<String>,
    pub age: Option<i32>,
    pub languages: Vec<String>,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Active
    }

    pub fn is_owned_by(&self, host_id: HostId) -> bool {
        self.host_id == host_id
    }
}

/// A validated trip that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrip {
    pub from_country: String,
    pub from_state: Option<String>,
    pub from_city: String,
    pub to_country: String,
    pub to_city: String,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_date: Option<NaiveDate>,
    pub arrival_time: Option<NaiveTime>,
    pub airline: Option<String>,
    pub flight_number: Option<String>,
    pub age: Option<i32>,
    pub languages: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TripValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },
    #[error("languages must be an array of strings")]
    LanguagesType,
}

/// Raw trip input as submitted by a host. Every field is optional here so that
/// missing and malformed input can be reported precisely.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TripDraft {
    pub from_country: Option<String>,
    pub from_state: Option<String>,
    pub from_city: Option<String>,
    pub to_country: Option<String>,
    pub to_city: Option<String>,
    pub travel_date: Option<String>,
    pub departure_time: Option<String>,
    pub arrival_date: Option<String>,
    pub arrival_time: Option<String>,
    pub airline: Option<String>,
    pub flight_number: Option<String>,
    pub age: Option<i32>,
    pub languages: Option<serde_json::Value>,
}

// blank strings count as missing
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, TripValidationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| TripValidationError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, TripValidationError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| TripValidationError::InvalidField {
            field,
            value: value.to_string(),
        })
}

impl TripDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, from_country: &str, from_city: &str, to_country: &str, to_city: &str) -> Self {
        self.from_country = Some(from_country.to_string());
        self.from_city = Some(from_city.to_string());
        self.to_country = Some(to_country.to_string());
        self.to_city = Some(to_city.to_string());
        self
    }

    pub fn departing(mut self, travel_date: &str, departure_time: &str) -> Self {
        self.travel_date = Some(travel_date.to_string());
        self.departure_time = Some(departure_time.to_string());
        self
    }

    pub fn languages(mut self, languages: serde_json::Value) -> Self {
        self.languages = Some(languages);
        self
    }

    /// Checks mandatory fields and types, returning the storable trip
    pub fn validate(self) -> Result<NewTrip, TripValidationError> {
        let mandatory: [(&'static str, &Option<String>); 6] = [
            ("from_country", &self.from_country),
            ("from_city", &self.from_city),
            ("to_country", &self.to_country),
            ("to_city", &self.to_city),
            ("travel_date", &self.travel_date),
            ("departure_time", &self.departure_time),
        ];
        let missing: Vec<&'static str> = mandatory
            .iter()
            .filter(|(_, value)| present(value).is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(TripValidationError::MissingFields(missing));
        }

        let languages = match self.languages {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Ok(s),
                    _ => Err(TripValidationError::LanguagesType),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(TripValidationError::LanguagesType),
        };

        let travel_date = parse_date("travel_date", present(&self.travel_date).unwrap_or_default())?;
        let departure_time = parse_time("departure_time", present(&self.departure_time).unwrap_or_default())?;
        let arrival_date = present(&self.arrival_date)
            .map(|v| parse_date("arrival_date", v))
            .transpose()?;
        let arrival_time = present(&self.arrival_time)
            .map(|v| parse_time("arrival_time", v))
            .transpose()?;

        if let Some(age) = self.age {
            if !(0..=150).contains(&age) {
                return Err(TripValidationError::InvalidField {
                    field: "age",
                    value: age.to_string(),
                });
            }
        }

        Ok(NewTrip {
            from_country: present(&self.from_country).unwrap_or_default().to_string(),
            from_state: optional(self.from_state),
            from_city: present(&self.from_city).unwrap_or_default().to_string(),
            to_country: present(&self.to_country).unwrap_or_default().to_string(),
            to_city: present(&self.to_city).unwrap_or_default().to_string(),
            travel_date,
            departure_time,
            arrival_date,
            arrival_time,
            airline: optional(self.airline),
            flight_number: optional(self.flight_number),
            age: self.age,
            languages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mumbai_to_miami() -> TripDraft {
        TripDraft::new()
            .route("IN", "Mumbai", "US", "Miami")
            .departing("2025-06-01", "09:30")
    }

    #[test]
    fn test_valid_draft() {
        let trip = mumbai_to_miami()
            .languages(json!(["Hindi", "English"]))
            .validate()
            .unwrap();
        assert_eq!(trip.travel_date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(trip.departure_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(trip.languages, vec!["Hindi", "English"]);
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let mut draft = mumbai_to_miami();
        draft.to_city = Some("   ".into());
        draft.departure_time = None;

        let err = draft.validate().unwrap_err();
        assert_eq!(
            err,
            TripValidationError::MissingFields(vec!["to_city", "departure_time"])
        );
    }

    #[test]
    fn test_languages_must_be_string_list() {
        let err = mumbai_to_miami()
            .languages(json!("English"))
            .validate()
            .unwrap_err();
        assert_eq!(err, TripValidationError::LanguagesType);

        let err = mumbai_to_miami()
            .languages(json!(["English", 3]))
            .validate()
            .unwrap_err();
        assert_eq!(err, TripValidationError::LanguagesType);
    }

    #[test]
    fn test_malformed_date() {
        let err = TripDraft::new()
            .route("IN", "Mumbai", "US", "Miami")
            .departing("01/06/2025", "09:30")
            .validate()
            .unwrap_err();
        assert!(matches!(err, TripValidationError::InvalidField { field: "travel_date", .. }));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        assert_eq!("cancelled".parse::<TripStatus>().unwrap(), TripStatus::Cancelled);
        assert!("archived".parse::<TripStatus>().is_err());
    }
}
