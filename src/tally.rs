use crate::battle::{Battle, BattleOptions, BattleOutcome, Side};
use crate::error::Result;
use crate::model::CombatantProfile;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Tally {
    pub runs: usize,
    pub a_wins: usize,
    pub b_wins: usize,
    pub draws: usize,
}

impl Tally {
    fn record(mut self, outcome: BattleOutcome) -> Self {
        self.runs += 1;
        match outcome {
            BattleOutcome::Winner(Side::A) => self.a_wins += 1,
            BattleOutcome::Winner(Side::B) => self.b_wins += 1,
            BattleOutcome::Draw => self.draws += 1,
        }
        self
    }

    fn merge(self, other: Tally) -> Tally {
        Tally {
            runs: self.runs + other.runs,
            a_wins: self.a_wins + other.a_wins,
            b_wins: self.b_wins + other.b_wins,
            draws: self.draws + other.draws,
        }
    }

    /// Side A's win rate, counting a draw as half a win.
    pub fn win_rate_a(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        (self.a_wins as f64 + 0.5 * self.draws as f64) / self.runs as f64
    }
}

/// Plays `runs` independently seeded battles in parallel.
///
/// The deadline and cancel token in `options` cover the whole tally and a time
/// limit applies to each battle; the first interrupted battle's error is returned.
pub fn tally(
    a: &CombatantProfile,
    b: &CombatantProfile,
    runs: usize,
    seed: u64,
    options: &BattleOptions,
) -> Result<Tally> {
    let mut master = SmallRng::seed_from_u64(seed);
    let seeds: Vec<u64> = (0..runs).map(|_| master.gen()).collect();
    seeds
        .par_iter()
        .map(|battle_seed| {
            Battle::seeded(a, b, *battle_seed)
                .with_options(options.clone())
                .run()
                .map(|report| report.outcome)
        })
        .try_fold(Tally::default, |acc, outcome| outcome.map(|o| acc.record(o)))
        .try_reduce(Tally::default, |x, y| Ok(x.merge(y)))
}
