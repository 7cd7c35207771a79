//! Live option chain snapshot returned by `GET /api/live-data`.
//!
//! Every numeric field is optional: before the first successful poll, and for strikes that
//! have not traded, the backend omits or nulls values.

use crate::{
    chain::{StrikeStratification, stratify},
    de::de_opt_f64,
    model::{Expiry, OptionSide, Strike},
};
use rust_decimal::{Decimal, RoundingStrategy, prelude::FromPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quote for the underlying instrument.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotQuote {
    #[serde(default, deserialize_with = "de_opt_f64", alias = "Ltp", alias = "lp")]
    pub ltp: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub open: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub high: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub low: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub close: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub change: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub percent_change: Option<f64>,
    #[serde(default)]
    pub display_symbol: Option<String>,
}

/// Greeks as computed by the backend.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Greeks {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub delta: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub gamma: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub theta: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub vega: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub rho: Option<f64>,
}

/// Market data for one call or put at a strike.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct OptionLeg {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub ltp: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", rename = "priceChangePercent")]
    pub price_change_percent: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub oi: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", rename = "oiChangePercent")]
    pub oi_change_percent: Option<f64>,

    /// Share of the chain's maximum OI, used for in-cell bars.
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub oi_percentage: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", rename = "oichng_percentage")]
    pub oi_change_percentage: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", rename = "vol_percentage")]
    pub volume_percentage: Option<f64>,

    #[serde(default, deserialize_with = "de_opt_f64", alias = "vol")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub iv: Option<f64>,
    #[serde(default)]
    pub greeks: Greeks,
}

/// Call and put legs at one strike. Either may be absent.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct StrikeRow {
    #[serde(default)]
    pub ce: Option<OptionLeg>,
    #[serde(default)]
    pub pe: Option<OptionLeg>,
}

impl StrikeRow {
    pub fn leg(&self, side: OptionSide) -> Option<&OptionLeg> {
        match side {
            OptionSide::Call => self.ce.as_ref(),
            OptionSide::Put => self.pe.as_ref(),
        }
    }
}

/// Chain-wide option statistics plus the strike ladder.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct OptionsSummary {
    #[serde(default, deserialize_with = "de_opt_f64", rename = "atmiv")]
    pub atm_iv: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", rename = "aivperchng")]
    pub iv_change_percent: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", rename = "dte")]
    pub days_to_expiry: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", rename = "olot")]
    pub lot_size: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", rename = "Rto")]
    pub put_call_ratio: Option<f64>,
    #[serde(default, rename = "oc")]
    pub strikes: BTreeMap<Strike, StrikeRow>,
}

/// Futures block of the payload; only the expiry list is consumed.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct FuturesSummary {
    #[serde(default, rename = "explist")]
    pub expiries: Vec<Expiry>,
}

/// Latest option chain snapshot for the selected instrument.
///
/// Replaced wholesale on every accepted poll, never merged.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LiveSnapshot {
    pub spot: SpotQuote,
    pub options: OptionsSummary,
    pub futures: FuturesSummary,
}

impl LiveSnapshot {
    /// Spot LTP rounded to the nearest integer (half away from zero).
    pub fn rounded_spot(&self) -> Option<Decimal> {
        self.spot
            .ltp
            .filter(|ltp| ltp.is_finite())
            .and_then(Decimal::from_f64)
            .map(|ltp| ltp.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Partition the strike ladder around the rounded spot.
    ///
    /// Returns `None` until a spot LTP is available.
    pub fn stratify(&self) -> Option<StrikeStratification> {
        self.rounded_spot()
            .map(|spot| stratify(self.options.strikes.keys().copied(), spot))
    }

    pub fn row(&self, strike: &Strike) -> Option<&StrikeRow> {
        self.options.strikes.get(strike)
    }

    pub fn leg(&self, strike: &Strike, side: OptionSide) -> Option<&OptionLeg> {
        self.row(strike).and_then(|row| row.leg(side))
    }
}

/// Envelope used by the backend around each block: `{ "data": { .. } }`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

/// Spot block, accepted with or without the `data` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum SpotBlock {
    Enveloped(Envelope<SpotQuote>),
    Bare(SpotQuote),
}

impl From<SpotBlock> for SpotQuote {
    fn from(block: SpotBlock) -> Self {
        match block {
            SpotBlock::Enveloped(Envelope { data }) => data,
            SpotBlock::Bare(quote) => quote,
        }
    }
}

/// Raw `GET /api/live-data` response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LiveDataResponse {
    #[serde(default)]
    pub spot: Option<SpotBlock>,
    #[serde(default)]
    pub options: Option<Envelope<OptionsSummary>>,
    #[serde(default)]
    pub fut: Option<Envelope<FuturesSummary>>,
}

impl From<LiveDataResponse> for LiveSnapshot {
    fn from(response: LiveDataResponse) -> Self {
        Self {
            spot: response.spot.map(SpotQuote::from).unwrap_or_default(),
            options: response
                .options
                .map(|envelope| envelope.data)
                .unwrap_or_default(),
            futures: response
                .fut
                .map(|envelope| envelope.data)
                .unwrap_or_default(),
        }
    }
}

/// Raw `GET /api/exp-date` response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExpiryListResponse {
    #[serde(default)]
    pub fut: Option<Envelope<FuturesSummary>>,
}

impl From<ExpiryListResponse> for Vec<Expiry> {
    fn from(response: ExpiryListResponse) -> Self {
        response
            .fut
            .map(|envelope| envelope.data.expiries)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const LIVE_DATA: &str = r#"
        {
            "spot": {
                "data": {
                    "ltp": 24112.35,
                    "open": 24050,
                    "high": 24150.1,
                    "low": 24010,
                    "close": 24080,
                    "change": 32.35,
                    "percentChange": 0.13,
                    "displaySymbol": "NIFTY"
                }
            },
            "options": {
                "data": {
                    "atmiv": 12.4,
                    "aivperchng": -1.2,
                    "dte": 3,
                    "olot": 75,
                    "Rto": 0.92,
                    "oc": {
                        "24000.000000": {
                            "ce": { "ltp": 180.5, "oi": 500, "oiChangePercent": 4.2, "volume": 1200, "iv": 12.9, "greeks": { "delta": 0.62 } },
                            "pe": { "ltp": 60.1, "oi": 900, "oiChangePercent": -2.0, "volume": 800, "iv": "13.1" }
                        },
                        "24100.000000": {
                            "ce": { "ltp": 110.0, "oi": 900, "volume": 3000, "iv": 12.1 },
                            "pe": { "ltp": 95.3, "oi": null, "volume": 2500, "iv": 12.3 }
                        },
                        "24200.000000": {
                            "ce": { "ltp": 62.4, "oi": 900, "volume": 1800, "iv": 11.8 }
                        }
                    }
                }
            },
            "fut": {
                "data": {
                    "explist": [1761202800, 1761807600]
                }
            }
        }
    "#;

    #[test]
    fn test_de_live_data_response() {
        let response = serde_json::from_str::<LiveDataResponse>(LIVE_DATA).unwrap();
        let snapshot = LiveSnapshot::from(response);

        assert_eq!(snapshot.spot.ltp, Some(24112.35));
        assert_eq!(snapshot.spot.display_symbol.as_deref(), Some("NIFTY"));
        assert_eq!(snapshot.options.atm_iv, Some(12.4));
        assert_eq!(snapshot.options.lot_size, Some(75.0));
        assert_eq!(snapshot.options.put_call_ratio, Some(0.92));
        assert_eq!(
            snapshot.futures.expiries,
            vec![Expiry(1761202800), Expiry(1761807600)]
        );

        let strikes = snapshot.options.strikes.keys().copied().collect::<Vec<_>>();
        assert_eq!(
            strikes,
            vec![
                Strike::new(dec!(24000)),
                Strike::new(dec!(24100)),
                Strike::new(dec!(24200))
            ]
        );

        let call = snapshot
            .leg(&Strike::new(dec!(24000)), OptionSide::Call)
            .unwrap();
        assert_eq!(call.oi, Some(500.0));
        assert_eq!(call.greeks.delta, Some(0.62));

        let put = snapshot
            .leg(&Strike::new(dec!(24000)), OptionSide::Put)
            .unwrap();
        assert_eq!(put.iv, Some(13.1));

        assert!(snapshot
            .leg(&Strike::new(dec!(24200)), OptionSide::Put)
            .is_none());
        assert_eq!(
            snapshot
                .leg(&Strike::new(dec!(24100)), OptionSide::Put)
                .unwrap()
                .oi,
            None
        );
    }

    #[test]
    fn test_de_live_data_response_partial() {
        let response = serde_json::from_str::<LiveDataResponse>(r#"{ "spot": { "ltp": 100 } }"#)
            .unwrap();
        let snapshot = LiveSnapshot::from(response);

        assert_eq!(snapshot.spot.ltp, Some(100.0));
        assert!(snapshot.options.strikes.is_empty());
        assert!(snapshot.futures.expiries.is_empty());
    }

    #[test]
    fn test_de_live_data_response_placeholder_values() {
        let input = r#"
            {
                "spot": { "ltp": "N/A" },
                "options": {
                    "data": {
                        "atmiv": "N/A",
                        "oc": {
                            "24000.000000": {
                                "ce": { "ltp": 180.5, "oi": "N/A", "iv": "--" }
                            }
                        }
                    }
                }
            }
        "#;

        let snapshot = LiveSnapshot::from(serde_json::from_str::<LiveDataResponse>(input).unwrap());

        assert_eq!(snapshot.spot.ltp, None);
        assert_eq!(snapshot.options.atm_iv, None);
        let call = snapshot
            .leg(&Strike::new(dec!(24000)), OptionSide::Call)
            .unwrap();
        assert_eq!(call.ltp, Some(180.5));
        assert_eq!(call.oi, None);
        assert_eq!(call.iv, None);
    }

    #[test]
    fn test_de_live_data_response_invalid_strike_key() {
        let input = r#"{ "options": { "data": { "oc": { "ATM": {} } } } }"#;
        assert!(serde_json::from_str::<LiveDataResponse>(input).is_err());
    }

    #[test]
    fn test_rounded_spot() {
        struct TestCase {
            ltp: Option<f64>,
            expected: Option<Decimal>,
        }

        let tests = vec![
            TestCase {
                // TC0: rounds down
                ltp: Some(24112.35),
                expected: Some(dec!(24112)),
            },
            TestCase {
                // TC1: midpoint rounds away from zero
                ltp: Some(24100.5),
                expected: Some(dec!(24101)),
            },
            TestCase {
                // TC2: missing ltp
                ltp: None,
                expected: None,
            },
            TestCase {
                // TC3: NaN ltp
                ltp: Some(f64::NAN),
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let snapshot = LiveSnapshot {
                spot: SpotQuote {
                    ltp: test.ltp,
                    ..SpotQuote::default()
                },
                ..LiveSnapshot::default()
            };
            assert_eq!(snapshot.rounded_spot(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_de_expiry_list_response() {
        let response = serde_json::from_str::<ExpiryListResponse>(
            r#"{ "fut": { "data": { "explist": [1761202800, 1761807600, 1762412400] } } }"#,
        )
        .unwrap();

        assert_eq!(
            Vec::<Expiry>::from(response),
            vec![Expiry(1761202800), Expiry(1761807600), Expiry(1762412400)]
        );
    }
}
