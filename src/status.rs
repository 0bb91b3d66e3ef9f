//! Paralysis, burn and poison: affliction, move prevention and residual damage.

use crate::damage::RollSource;
use std::fmt;

pub const PARALYSIS_SKIP_CHANCE: f64 = 0.25;
pub const AFFLICTION_CHANCE: f64 = 0.2;
const BURN_FRACTION: f64 = 0.0625;
const POISON_FRACTION: f64 = 0.125;

/// A combatant carries `Option<Status>`; `None` is the healthy state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Paralysis,
    Burn,
    Poison,
}

impl Status {
    pub fn name(self) -> &'static str {
        match self {
            Status::Paralysis => "paralysis",
            Status::Burn => "burn",
            Status::Poison => "poison",
        }
    }

    /// The ailment a move of this type can inflict, if any.
    pub fn inflicted_by(move_type: &str) -> Option<Status> {
        match move_type.to_ascii_lowercase().as_str() {
            "electric" => Some(Status::Paralysis),
            "fire" => Some(Status::Burn),
            "poison" => Some(Status::Poison),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Speed used for turn order. Paralysis halves it, rounding down.
pub fn effective_speed(speed: u32, status: Option<Status>) -> u32 {
    match status {
        Some(Status::Paralysis) => speed / 2,
        Some(Status::Burn) | Some(Status::Poison) | None => speed,
    }
}

/// Rolls only when the combatant is paralysed.
pub fn is_fully_paralyzed<R: RollSource + ?Sized>(status: Option<Status>, rng: &mut R) -> bool {
    match status {
        Some(Status::Paralysis) => rng.roll() < PARALYSIS_SKIP_CHANCE,
        _ => false,
    }
}

/// Attempts to afflict a target after a landed hit.
///
/// A target that already carries a status is left alone and no roll is made.
/// Otherwise one roll is consumed even when the move type inflicts nothing.
pub fn try_afflict<R: RollSource + ?Sized>(
    target: &mut Option<Status>,
    move_type: &str,
    rng: &mut R,
) -> Option<Status> {
    if target.is_some() {
        return None;
    }
    if rng.roll() >= AFFLICTION_CHANCE {
        return None;
    }
    let inflicted = Status::inflicted_by(move_type)?;
    *target = Some(inflicted);
    Some(inflicted)
}

/// HP lost to burn or poison for a combatant with the given max HP.
pub fn residual_damage(status: Option<Status>, max_hp: u32) -> Option<u32> {
    let fraction = match status? {
        Status::Burn => BURN_FRACTION,
        Status::Poison => POISON_FRACTION,
        Status::Paralysis => return None,
    };
    Some((max_hp as f64 * fraction).floor() as u32)
}
