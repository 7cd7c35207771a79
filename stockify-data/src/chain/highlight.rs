//! Hot-cell detection: per column maximum over the visible strike window.
//!
//! Flags are computed from the rows currently being rendered, not from the full chain, and are
//! recomputed on every render pass.

use crate::{
    model::{OptionSide, Strike},
    snapshot::{OptionLeg, StrikeRow},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric columns tracked for hot cells.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Metric {
    OpenInterest,
    OiChange,
    Volume,
    ImpliedVolatility,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::OpenInterest,
        Metric::OiChange,
        Metric::Volume,
        Metric::ImpliedVolatility,
    ];

    /// Raw value of this metric on a leg.
    pub fn value(&self, leg: &OptionLeg) -> Option<f64> {
        match self {
            Metric::OpenInterest => leg.oi,
            Metric::OiChange => leg.oi_change_percent,
            Metric::Volume => leg.volume,
            Metric::ImpliedVolatility => leg.iv,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::OpenInterest => "OI",
            Metric::OiChange => "OI Chg%",
            Metric::Volume => "Volume",
            Metric::ImpliedVolatility => "IV",
        }
    }
}

/// Maximum of one (side, metric) column and the strikes holding it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnHighlight {
    pub max: Option<f64>,
    pub hot: Vec<Strike>,
}

impl ColumnHighlight {
    pub fn is_hot(&self, strike: &Strike) -> bool {
        self.hot.contains(strike)
    }
}

/// Compute the hot strikes of one column over the visible `window`.
///
/// Missing and `NaN` values never participate. Every strike whose value equals the maximum is
/// flagged, so exact ties flag more than one strike.
pub fn compute_highlights<'a, Window>(
    window: Window,
    side: OptionSide,
    metric: Metric,
) -> ColumnHighlight
where
    Window: IntoIterator<Item = (Strike, &'a StrikeRow)>,
{
    let values = window
        .into_iter()
        .filter_map(|(strike, row)| {
            row.leg(side)
                .and_then(|leg| metric.value(leg))
                .filter(|value| !value.is_nan())
                .map(|value| (strike, value))
        })
        .collect::<Vec<_>>();

    let Some(max) = values.iter().map(|(_, value)| *value).reduce(f64::max) else {
        return ColumnHighlight::default();
    };

    let hot = values
        .into_iter()
        .filter(|(_, value)| *value == max)
        .map(|(strike, _)| strike)
        .collect();

    ColumnHighlight {
        max: Some(max),
        hot,
    }
}

/// Hot cells for every (side, metric) column of one render pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HighlightFlags {
    columns: BTreeMap<(OptionSide, Metric), ColumnHighlight>,
}

impl HighlightFlags {
    /// Compute all eight columns over the visible `window`.
    pub fn compute<'a, Window>(window: Window) -> Self
    where
        Window: IntoIterator<Item = (Strike, &'a StrikeRow)>,
    {
        let window = window.into_iter().collect::<Vec<_>>();

        let columns = OptionSide::ALL
            .into_iter()
            .flat_map(|side| Metric::ALL.into_iter().map(move |metric| (side, metric)))
            .map(|(side, metric)| {
                let column = compute_highlights(window.iter().copied(), side, metric);
                ((side, metric), column)
            })
            .collect();

        Self { columns }
    }

    pub fn column(&self, side: OptionSide, metric: Metric) -> Option<&ColumnHighlight> {
        self.columns.get(&(side, metric))
    }

    pub fn is_hot(&self, strike: &Strike, side: OptionSide, metric: Metric) -> bool {
        self.column(side, metric)
            .is_some_and(|column| column.is_hot(strike))
    }
}
