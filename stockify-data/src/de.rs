//! Deserialisation helpers for the loosely typed backend payloads.
//!
//! The backend emits numbers either as JSON numbers, as numeric strings, or as `null` while a
//! strike has not traded yet. These helpers normalise all three into `Option<f64>`.

use serde::{Deserialize, Deserializer};
use tracing::debug;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

/// Deserialize a JSON number, numeric string, or null as an optional f64.
///
/// Blank strings, the literal `"-"` and any other unparseable string such as `"N/A"` map to
/// `None`, so one bad cell never fails the whole payload. Non-finite results are kept as-is so
/// callers can decide how to treat `NaN` (see [`crate::chain::highlight`]).
pub fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<NumberOrString> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(NumberOrString::Number(number)) => Ok(Some(number)),
        Some(NumberOrString::String(raw)) => {
            let raw = raw.trim();
            if raw.is_empty() || raw == "-" {
                Ok(None)
            } else {
                Ok(raw.parse::<f64>().map_or_else(
                    |error| {
                        debug!(value = raw, %error, "ignoring unparseable numeric value");
                        None
                    },
                    Some,
                ))
            }
        }
    }
}

/// Deserialize a sequence whose elements may be numbers, numeric strings or null.
///
/// Null, blank or unparseable elements become `NaN` so the sequence keeps its alignment with sibling series.
pub fn de_vec_f64<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Element(#[serde(deserialize_with = "de_opt_f64")] Option<f64>);

    let elements: Option<Vec<Element>> = Option::deserialize(deserializer)?;
    Ok(elements
        .unwrap_or_default()
        .into_iter()
        .map(|Element(value)| value.unwrap_or(f64::NAN))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        #[serde(default, deserialize_with = "de_opt_f64")]
        value: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    struct SeriesWrapper {
        #[serde(default, deserialize_with = "de_vec_f64")]
        values: Vec<f64>,
    }

    #[test]
    fn test_de_opt_f64() {
        struct TestCase {
            input: &'static str,
            expected: Option<f64>,
        }

        let tests = vec![
            TestCase {
                // TC0: JSON number
                input: r#"{"value": 24100.5}"#,
                expected: Some(24100.5),
            },
            TestCase {
                // TC1: JSON integer
                input: r#"{"value": 75}"#,
                expected: Some(75.0),
            },
            TestCase {
                // TC2: numeric string
                input: r#"{"value": "13.25"}"#,
                expected: Some(13.25),
            },
            TestCase {
                // TC3: blank string
                input: r#"{"value": " "}"#,
                expected: None,
            },
            TestCase {
                // TC4: dash placeholder
                input: r#"{"value": "-"}"#,
                expected: None,
            },
            TestCase {
                // TC5: explicit null
                input: r#"{"value": null}"#,
                expected: None,
            },
            TestCase {
                // TC6: missing field
                input: r#"{}"#,
                expected: None,
            },
            TestCase {
                // TC7: non-numeric placeholder
                input: r#"{"value": "N/A"}"#,
                expected: None,
            },
            TestCase {
                // TC8: garbage string
                input: r#"{"value": "abc"}"#,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::from_str::<Wrapper>(test.input).unwrap();
            assert_eq!(actual.value, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_de_opt_f64_rejects_non_numeric_json() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"value": true}"#).is_err());
    }

    #[test]
    fn test_de_vec_f64_keeps_alignment() {
        let actual =
            serde_json::from_str::<SeriesWrapper>(r#"{"values": [1, "2.5", null, "N/A", 4]}"#)
                .unwrap();

        assert_eq!(actual.values.len(), 5);
        assert_eq!(actual.values[0], 1.0);
        assert_eq!(actual.values[1], 2.5);
        assert!(actual.values[2].is_nan());
        assert!(actual.values[3].is_nan());
        assert_eq!(actual.values[4], 4.0);
    }
}
