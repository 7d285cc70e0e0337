//! The raw record list returned by an upstream source for one chunk, and its shape check.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field holding the calendar date of a daily record.
pub const DATE_FIELD: &str = "fecha";

/// Verbatim upstream records for one chunk: a list of JSON objects.
///
/// Payloads are persisted exactly as received; normalisation into
/// [`DailyRecord`](crate::DailyRecord)s happens during consolidation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPayload(pub Vec<Map<String, Value>>);

impl RawPayload {
    pub fn records(&self) -> &[Map<String, Value>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks the basic shape of the payload: non-empty, every record carries each
    /// `required_fields` entry, and every record's date field is an ISO date.
    pub fn validate<S: AsRef<str>>(&self, required_fields: &[S]) -> Result<(), PayloadError> {
        if self.is_empty() {
            return Err(PayloadError::Empty);
        }
        for (index, record) in self.0.iter().enumerate() {
            for field in required_fields {
                let field = field.as_ref();
                if !record.contains_key(field) {
                    return Err(PayloadError::MissingField {
                        index,
                        field: field.to_string(),
                    });
                }
            }
            record_date(record).map_err(|value| PayloadError::InvalidDate { index, value })?;
        }
        Ok(())
    }
}

/// Reads the date field of a raw record, returning the offending value on failure.
pub(crate) fn record_date(record: &Map<String, Value>) -> Result<NaiveDate, String> {
    match record.get(DATE_FIELD) {
        Some(Value::String(raw)) => {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| raw.clone())
        }
        Some(other) => Err(other.to_string()),
        None => Err("<missing>".to_string()),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Payload contains no records")]
    Empty,

    #[error("Record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: String },

    #[error("Record {index} has an unparsable date '{value}'")]
    InvalidDate { index: usize, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> RawPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_payload() {
        let p = payload(json!([
            {"fecha": "2009-01-01", "tmed": "10,5"},
            {"fecha": "2009-01-02", "tmed": "9,1"}
        ]));
        assert_eq!(p.validate(&["fecha", "tmed"]), Ok(()));
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert_eq!(RawPayload::default().validate(&["fecha"]), Err(PayloadError::Empty));
    }

    #[test]
    fn test_missing_field_rejected() {
        let p = payload(json!([{"fecha": "2009-01-01"}, {"tmed": "1,0"}]));
        assert_eq!(
            p.validate(&["fecha"]),
            Err(PayloadError::MissingField {
                index: 1,
                field: "fecha".to_string()
            })
        );
    }

    #[test]
    fn test_bad_date_rejected_even_when_not_required() {
        let p = payload(json!([{"fecha": "01/01/2009"}]));
        assert_eq!(
            p.validate::<&str>(&[]),
            Err(PayloadError::InvalidDate {
                index: 0,
                value: "01/01/2009".to_string()
            })
        );
    }

    #[test]
    fn test_non_object_records_fail_to_decode() {
        assert!(serde_json::from_value::<RawPayload>(json!([1, 2])).is_err());
        assert!(serde_json::from_value::<RawPayload>(json!({"estado": 200})).is_err());
    }
}
