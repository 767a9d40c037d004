//! Hotel and mapping export filters
//!
//! The backend treats the payload as opaque JSON; these are the checks the
//! dashboard applies before submitting it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::ExportKind;

/// Highest star rating a hotel can carry
pub const MAX_RATING: f32 = 5.0;

/// Errors from filter validation
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("Rating {0} is outside 0-{max}", max = MAX_RATING)]
    RatingOutOfRange(f32),

    #[error("Minimum rating {min} is above maximum rating {max}")]
    RatingRangeInverted { min: f32, max: f32 },

    #[error("Start date {from} is after end date {to}")]
    DateRangeInverted { from: NaiveDate, to: NaiveDate },

    #[error("Select at least one {0}")]
    EmptySelection(&'static str),

    #[error("Invalid filter payload: {0}")]
    InvalidPayload(String),
}

/// Filter payload for an export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportFilters {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppliers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cities: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<f32>,

    /// Only records updated on or after this date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_from: Option<NaiveDate>,

    /// Only records updated on or before this date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_to: Option<NaiveDate>,

    #[serde(default)]
    pub include_inactive: bool,
}

impl ExportFilters {
    /// Parse a raw JSON payload
    pub fn from_json(raw: &str) -> Result<Self, FilterError> {
        serde_json::from_str(raw).map_err(|e| FilterError::InvalidPayload(e.to_string()))
    }

    /// Check the filters are submittable for `kind`
    pub fn validate(&self, kind: ExportKind) -> Result<(), FilterError> {
        debug!(%kind, ?self, "validate: called");
        for rating in [self.min_rating, self.max_rating].into_iter().flatten() {
            if !(0.0..=MAX_RATING).contains(&rating) {
                return Err(FilterError::RatingOutOfRange(rating));
            }
        }

        if let (Some(min), Some(max)) = (self.min_rating, self.max_rating) {
            if min > max {
                return Err(FilterError::RatingRangeInverted { min, max });
            }
        }

        if let (Some(from), Some(to)) = (self.updated_from, self.updated_to) {
            if from > to {
                return Err(FilterError::DateRangeInverted { from, to });
            }
        }

        if kind == ExportKind::Mapping && self.suppliers.iter().all(|s| s.trim().is_empty()) {
            return Err(FilterError::EmptySelection("supplier"));
        }

        Ok(())
    }

    /// Opaque payload sent to the create endpoint
    pub fn to_payload(&self) -> Value {
        // Plain data with string keys always serializes
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Merge another set of filters in; non-empty fields of `other` win
    pub fn merge(mut self, other: ExportFilters) -> Self {
        if !other.suppliers.is_empty() {
            self.suppliers = other.suppliers;
        }
        if !other.countries.is_empty() {
            self.countries = other.countries;
        }
        if !other.cities.is_empty() {
            self.cities = other.cities;
        }
        self.min_rating = other.min_rating.or(self.min_rating);
        self.max_rating = other.max_rating.or(self.max_rating);
        self.updated_from = other.updated_from.or(self.updated_from);
        self.updated_to = other.updated_to.or(self.updated_to);
        self.include_inactive |= other.include_inactive;
        self
    }
}
