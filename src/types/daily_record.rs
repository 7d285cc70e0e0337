//! Normalised daily observation as written to a yearly archive.
//!
//! Upstream values arrive as strings using a decimal comma (`"10,5"`), and
//! precipitation may carry the token `"Ip"` for an inappreciable amount. Both are
//! converted to plain numbers here; anything unparsable becomes `null`.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "indicativo", default, deserialize_with = "lenient_text")]
    pub station_id: Option<String>,
    #[serde(rename = "nombre", default, deserialize_with = "lenient_text")]
    pub station_name: Option<String>,
    #[serde(rename = "provincia", default, deserialize_with = "lenient_text")]
    pub province: Option<String>,
    #[serde(rename = "altitud", default, deserialize_with = "lenient_text")]
    pub altitude: Option<String>,
    #[serde(rename = "tmed", default, deserialize_with = "lenient_decimal")]
    pub temp_avg: Option<f64>, // °C
    #[serde(rename = "prec", default, deserialize_with = "lenient_decimal")]
    pub precipitation: Option<f64>, // mm
    #[serde(rename = "tmin", default, deserialize_with = "lenient_decimal")]
    pub temp_min: Option<f64>, // °C
    #[serde(rename = "tmax", default, deserialize_with = "lenient_decimal")]
    pub temp_max: Option<f64>, // °C
    #[serde(rename = "dir", default, deserialize_with = "lenient_text")]
    pub wind_direction: Option<String>, // tens of degrees, or code
    #[serde(rename = "velmedia", default, deserialize_with = "lenient_decimal")]
    pub wind_speed_avg: Option<f64>, // m/s
    #[serde(rename = "racha", default, deserialize_with = "lenient_decimal")]
    pub peak_wind_gust: Option<f64>, // m/s
    #[serde(rename = "sol", default, deserialize_with = "lenient_decimal")]
    pub sunshine_hours: Option<f64>, // h
    #[serde(rename = "presMax", default, deserialize_with = "lenient_decimal")]
    pub pressure_max: Option<f64>, // hPa
    #[serde(rename = "presMin", default, deserialize_with = "lenient_decimal")]
    pub pressure_min: Option<f64>, // hPa
    #[serde(rename = "hrMedia", default, deserialize_with = "lenient_decimal")]
    pub humidity_avg: Option<f64>, // %
}

impl DailyRecord {
    /// Normalises one raw upstream record. Unknown fields are ignored.
    pub fn from_raw(record: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record.clone()))
    }
}

fn parse_decimal(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s.trim().replace(',', ".");
            if cleaned.is_empty() {
                None
            } else if cleaned.eq_ignore_ascii_case("ip") {
                Some(0.0)
            } else {
                cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
            }
        }
        _ => None,
    }
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_decimal))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
