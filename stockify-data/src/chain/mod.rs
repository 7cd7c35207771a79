//! Derived analytics over a [`LiveSnapshot`]: strike stratification, hot cells, chain totals,
//! and the [`ChainView`] a presentation layer renders each frame.

use crate::{
    model::{OptionSide, Strike},
    snapshot::{LiveSnapshot, OptionLeg, StrikeRow},
};
use serde::{Deserialize, Serialize};

pub mod highlight;
pub mod stratify;

pub use highlight::{ColumnHighlight, HighlightFlags, Metric, compute_highlights};
pub use stratify::{ChainRow, Moneyness, StrikeStratification, stratify};

/// Default number of strikes shown on each side of spot.
pub const DEFAULT_STRIKE_DEPTH: usize = 15;

/// Render-time options read from the session.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct ViewOptions {
    pub reversed: bool,
    pub highlighting: bool,
    /// Strikes kept on each side of spot; `None` renders the full ladder.
    pub depth: Option<usize>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            reversed: false,
            highlighting: true,
            depth: Some(DEFAULT_STRIKE_DEPTH),
        }
    }
}

impl ViewOptions {
    /// Narrow the strike depth so the rendered rows fit in `rows` lines.
    ///
    /// The window stays centred on spot: `depth` strikes each side plus the pivot.
    pub fn fit_rows(self, rows: usize) -> Self {
        let max_depth = rows.saturating_sub(1) / 2;
        Self {
            depth: Some(self.depth.map_or(max_depth, |depth| depth.min(max_depth))),
            ..self
        }
    }
}

/// Summed open interest and volume across the full chain.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ChainTotals {
    pub call_oi: f64,
    pub put_oi: f64,
    pub call_volume: f64,
    pub put_volume: f64,
}

impl ChainTotals {
    pub fn from_rows<'a, Rows>(rows: Rows) -> Self
    where
        Rows: IntoIterator<Item = &'a StrikeRow>,
    {
        fn finite(value: Option<f64>) -> f64 {
            value.filter(|value| value.is_finite()).unwrap_or(0.0)
        }

        rows.into_iter().fold(Self::default(), |mut totals, row| {
            if let Some(leg) = &row.ce {
                totals.call_oi += finite(leg.oi);
                totals.call_volume += finite(leg.volume);
            }
            if let Some(leg) = &row.pe {
                totals.put_oi += finite(leg.oi);
                totals.put_volume += finite(leg.volume);
            }
            totals
        })
    }

    /// Put/call ratio of open interest, `None` while no call OI exists.
    pub fn oi_put_call_ratio(&self) -> Option<f64> {
        (self.call_oi > 0.0).then(|| self.put_oi / self.call_oi)
    }
}

/// Everything needed to render one frame of the chain table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainView {
    pub stratification: StrikeStratification,
    pub rows: Vec<ChainRow>,
    pub highlights: HighlightFlags,
    pub totals: ChainTotals,
}

impl ChainView {
    /// Build the view for one render pass.
    ///
    /// Returns `None` until the snapshot carries a spot price. Hot cells are computed over the
    /// windowed rows only.
    pub fn build(snapshot: &LiveSnapshot, options: ViewOptions) -> Option<Self> {
        let full = snapshot.stratify()?;
        let stratification = match options.depth {
            Some(depth) => full.windowed(depth),
            None => full,
        };

        let rows = stratification.rows(options.reversed);

        let highlights = if options.highlighting {
            HighlightFlags::compute(
                rows.iter()
                    .filter_map(|row| snapshot.row(&row.strike).map(|data| (row.strike, data))),
            )
        } else {
            HighlightFlags::default()
        };

        Some(Self {
            stratification,
            rows,
            highlights,
            totals: ChainTotals::from_rows(snapshot.options.strikes.values()),
        })
    }

    pub fn is_hot(&self, strike: &Strike, side: OptionSide, metric: Metric) -> bool {
        self.highlights.is_hot(strike, side, metric)
    }

    /// Legs of a displayed row, looked up in the snapshot the view was built from.
    pub fn legs<'a>(
        &self,
        snapshot: &'a LiveSnapshot,
        strike: &Strike,
    ) -> (Option<&'a OptionLeg>, Option<&'a OptionLeg>) {
        snapshot
            .row(strike)
            .map(|row| (row.ce.as_ref(), row.pe.as_ref()))
            .unwrap_or((None, None))
    }
}
