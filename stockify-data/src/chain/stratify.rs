//! Partitioning of the strike ladder around the rounded spot price.

use crate::model::{OptionSide, Strike};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a displayed strike sits relative to spot.
///
/// The display split is spot-relative and call-oriented: strikes below spot are
/// [`Moneyness::InTheMoney`]. Use [`Moneyness::for_side`] for the put view.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Moneyness {
    InTheMoney,
    AtTheMoney,
    OutOfTheMoney,
}

impl Moneyness {
    /// Moneyness of this zone from the perspective of the given option side.
    pub fn for_side(self, side: OptionSide) -> Moneyness {
        match (self, side) {
            (zone, OptionSide::Call) | (zone @ Moneyness::AtTheMoney, _) => zone,
            (Moneyness::InTheMoney, OptionSide::Put) => Moneyness::OutOfTheMoney,
            (Moneyness::OutOfTheMoney, OptionSide::Put) => Moneyness::InTheMoney,
        }
    }
}

/// One displayed row of the ladder.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct ChainRow {
    pub strike: Strike,
    pub moneyness: Moneyness,
}

/// Strike ladder split into ITM / OTM halves around the rounded spot.
///
/// Invariants:
/// - `itm_strikes` and `otm_strikes` are disjoint and ascending.
/// - Their union is every strike except the `pivot`.
/// - The `pivot` is present only when spot equals a strike exactly.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct StrikeStratification {
    pub spot: Decimal,
    pub nearest_strike: Option<Strike>,
    pub pivot: Option<Strike>,
    pub itm_strikes: Vec<Strike>,
    pub otm_strikes: Vec<Strike>,
}

/// Partition `strikes` into those below (ITM) and above (OTM) the rounded `spot`.
///
/// Duplicate strikes are collapsed. The nearest strike prefers the lower key on a tie.
pub fn stratify<Strikes>(strikes: Strikes, spot: Decimal) -> StrikeStratification
where
    Strikes: IntoIterator<Item = Strike>,
{
    let sorted = strikes.into_iter().sorted().dedup().collect::<Vec<_>>();

    let nearest_strike = sorted
        .iter()
        .copied()
        .min_by_key(|strike| strike.distance(spot));

    let pivot = sorted
        .binary_search(&Strike::new(spot))
        .ok()
        .map(|index| sorted[index]);

    let (itm_strikes, otm_strikes) = sorted
        .into_iter()
        .filter(|strike| Some(*strike) != pivot)
        .partition(|strike| strike.value() < spot);

    StrikeStratification {
        spot,
        nearest_strike,
        pivot,
        itm_strikes,
        otm_strikes,
    }
}

impl StrikeStratification {
    /// Number of displayed rows, pivot included.
    pub fn len(&self) -> usize {
        self.itm_strikes.len() + self.otm_strikes.len() + usize::from(self.pivot.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep at most `depth` strikes on each side of spot, closest first.
    ///
    /// The pivot is always kept.
    pub fn windowed(&self, depth: usize) -> Self {
        let itm_start = self.itm_strikes.len().saturating_sub(depth);
        let otm_end = self.otm_strikes.len().min(depth);

        Self {
            spot: self.spot,
            nearest_strike: self.nearest_strike,
            pivot: self.pivot,
            itm_strikes: self.itm_strikes[itm_start..].to_vec(),
            otm_strikes: self.otm_strikes[..otm_end].to_vec(),
        }
    }

    /// Display rows: ITM ascending, pivot, OTM ascending.
    ///
    /// When `reversed` the whole sequence is reversed end to end, not each half.
    pub fn rows(&self, reversed: bool) -> Vec<ChainRow> {
        let itm = self.itm_strikes.iter().map(|&strike| ChainRow {
            strike,
            moneyness: Moneyness::InTheMoney,
        });
        let pivot = self.pivot.map(|strike| ChainRow {
            strike,
            moneyness: Moneyness::AtTheMoney,
        });
        let otm = self.otm_strikes.iter().map(|&strike| ChainRow {
            strike,
            moneyness: Moneyness::OutOfTheMoney,
        });

        let mut rows = itm.chain(pivot).chain(otm).collect::<Vec<_>>();
        if reversed {
            rows.reverse();
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn strikes(values: &[Decimal]) -> Vec<Strike> {
        values.iter().copied().map(Strike::new).collect()
    }

    #[test]
    fn test_stratify() {
        struct TestCase {
            strikes: Vec<Strike>,
            spot: Decimal,
            expected: StrikeStratification,
        }

        let tests = vec![
            TestCase {
                // TC0: spot equals a strike, which becomes the pivot
                strikes: strikes(&[dec!(24000), dec!(24100), dec!(24200)]),
                spot: dec!(24100),
                expected: StrikeStratification {
                    spot: dec!(24100),
                    nearest_strike: Some(Strike::new(dec!(24100))),
                    pivot: Some(Strike::new(dec!(24100))),
                    itm_strikes: strikes(&[dec!(24000)]),
                    otm_strikes: strikes(&[dec!(24200)]),
                },
            },
            TestCase {
                // TC1: spot between strikes, nothing excluded
                strikes: strikes(&[dec!(24200), dec!(24000), dec!(24100)]),
                spot: dec!(24130),
                expected: StrikeStratification {
                    spot: dec!(24130),
                    nearest_strike: Some(Strike::new(dec!(24100))),
                    pivot: None,
                    itm_strikes: strikes(&[dec!(24000), dec!(24100)]),
                    otm_strikes: strikes(&[dec!(24200)]),
                },
            },
            TestCase {
                // TC2: equidistant strikes, lower key is nearest
                strikes: strikes(&[dec!(24000), dec!(24100)]),
                spot: dec!(24050),
                expected: StrikeStratification {
                    spot: dec!(24050),
                    nearest_strike: Some(Strike::new(dec!(24000))),
                    pivot: None,
                    itm_strikes: strikes(&[dec!(24000)]),
                    otm_strikes: strikes(&[dec!(24100)]),
                },
            },
            TestCase {
                // TC3: spot below the whole ladder
                strikes: strikes(&[dec!(100), dec!(110)]),
                spot: dec!(90),
                expected: StrikeStratification {
                    spot: dec!(90),
                    nearest_strike: Some(Strike::new(dec!(100))),
                    pivot: None,
                    itm_strikes: vec![],
                    otm_strikes: strikes(&[dec!(100), dec!(110)]),
                },
            },
            TestCase {
                // TC4: empty ladder
                strikes: vec![],
                spot: dec!(24100),
                expected: StrikeStratification {
                    spot: dec!(24100),
                    nearest_strike: None,
                    pivot: None,
                    itm_strikes: vec![],
                    otm_strikes: vec![],
                },
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = stratify(test.strikes, test.spot);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_stratify_partitions_are_disjoint_and_cover_all_but_pivot() {
        let ladder = (0..40)
            .map(|step| Strike::new(Decimal::from(23000 + step * 50)))
            .collect::<Vec<_>>();

        for spot in [dec!(22900), dec!(23000), dec!(23475), dec!(23500), dec!(25000)] {
            let stratification = stratify(ladder.clone(), spot);

            let overlap = stratification
                .itm_strikes
                .iter()
                .filter(|strike| stratification.otm_strikes.contains(strike))
                .count();
            assert_eq!(overlap, 0, "spot {spot}: partitions overlap");

            let mut union = stratification
                .itm_strikes
                .iter()
                .chain(stratification.otm_strikes.iter())
                .copied()
                .collect::<Vec<_>>();
            union.sort();

            let expected = ladder
                .iter()
                .copied()
                .filter(|strike| Some(*strike) != stratification.pivot)
                .collect::<Vec<_>>();
            assert_eq!(union, expected, "spot {spot}: union mismatch");
        }
    }

    #[test]
    fn test_rows_reversed_is_exact_reverse() {
        let stratification = stratify(
            strikes(&[dec!(24000), dec!(24050), dec!(24100), dec!(24150), dec!(24200)]),
            dec!(24100),
        );

        let forward = stratification.rows(false);
        let mut reversed = stratification.rows(true);
        reversed.reverse();

        assert_eq!(forward, reversed);
        assert_eq!(forward.len(), 5);
        assert_eq!(
            forward[2],
            ChainRow {
                strike: Strike::new(dec!(24100)),
                moneyness: Moneyness::AtTheMoney,
            }
        );
        assert_eq!(forward[0].moneyness, Moneyness::InTheMoney);
        assert_eq!(forward[4].moneyness, Moneyness::OutOfTheMoney);
    }

    #[test]
    fn test_rows_pivot_rendered_once() {
        let stratification = stratify(
            strikes(&[dec!(24000), dec!(24100), dec!(24200)]),
            dec!(24100),
        );

        let pivot_rows = stratification
            .rows(false)
            .into_iter()
            .filter(|row| row.strike == Strike::new(dec!(24100)))
            .count();
        assert_eq!(pivot_rows, 1);
    }

    #[test]
    fn test_windowed_keeps_nearest_strikes() {
        let ladder = (0..11)
            .map(|step| Strike::new(Decimal::from(24000 + step * 50)))
            .collect::<Vec<_>>();

        // Spot 24250: ITM 24000..24200, pivot 24250, OTM 24300..24500
        let windowed = stratify(ladder, dec!(24250)).windowed(2);

        assert_eq!(windowed.itm_strikes, strikes(&[dec!(24150), dec!(24200)]));
        assert_eq!(windowed.pivot, Some(Strike::new(dec!(24250))));
        assert_eq!(windowed.otm_strikes, strikes(&[dec!(24300), dec!(24350)]));
        assert_eq!(windowed.len(), 5);
    }

    #[test]
    fn test_moneyness_for_side() {
        assert_eq!(
            Moneyness::InTheMoney.for_side(OptionSide::Put),
            Moneyness::OutOfTheMoney
        );
        assert_eq!(
            Moneyness::OutOfTheMoney.for_side(OptionSide::Put),
            Moneyness::InTheMoney
        );
        assert_eq!(
            Moneyness::AtTheMoney.for_side(OptionSide::Put),
            Moneyness::AtTheMoney
        );
        assert_eq!(
            Moneyness::InTheMoney.for_side(OptionSide::Call),
            Moneyness::InTheMoney
        );
    }
}
