use crate::model::{CombatantProfile, MoveCategory, MoveDescriptor};
use crate::types::effectiveness;
use rand::rngs::{SmallRng, StdRng};
use rand::Rng;

pub const LEVEL: f64 = 50.0;
const DEFAULT_OFFENSE: u32 = 50;
const DEFAULT_DEFENSE: u32 = 50;
const RANDOM_FLOOR: f64 = 0.85;
const RANDOM_SPAN: f64 = 0.15;

/// Uniform draws in `[0, 1)` consumed by the engine.
///
/// Every random decision (damage spread, accuracy, paralysis, affliction) is
/// derived from `roll`, so a fixed source makes a whole battle reproducible.
pub trait RollSource {
    fn roll(&mut self) -> f64;
}

impl RollSource for SmallRng {
    fn roll(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

impl RollSource for StdRng {
    fn roll(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Always returns the same draw. `FixedRoll(0.5)` gives a damage spread of 0.925,
/// never paralyses, never afflicts, and only misses moves below 50 accuracy.
#[derive(Clone, Copy, Debug)]
pub struct FixedRoll(pub f64);

impl RollSource for FixedRoll {
    fn roll(&mut self) -> f64 {
        self.0
    }
}

/// Damage spread in `[0.85, 1.00)`.
pub fn random_factor<R: RollSource + ?Sized>(rng: &mut R) -> f64 {
    RANDOM_FLOOR + rng.roll() * RANDOM_SPAN
}

fn offense_and_defense(
    attacker: &CombatantProfile,
    defender: &CombatantProfile,
    move_def: &MoveDescriptor,
) -> (f64, f64) {
    let (atk, def) = match move_def.damage_class() {
        MoveCategory::Physical => (
            attacker.stat("attack", DEFAULT_OFFENSE),
            defender.stat("defense", DEFAULT_DEFENSE),
        ),
        MoveCategory::Special => (
            attacker.stat("special-attack", DEFAULT_OFFENSE),
            defender.stat("special-defense", DEFAULT_DEFENSE),
        ),
    };
    (atk as f64, def.max(1) as f64)
}

/// Damage before STAB, type and spread modifiers.
pub fn base_damage(
    attacker: &CombatantProfile,
    defender: &CombatantProfile,
    move_def: &MoveDescriptor,
) -> f64 {
    let (atk, def) = offense_and_defense(attacker, defender, move_def);
    let power = move_def.base_power() as f64;
    (((2.0 * LEVEL / 5.0 + 2.0) * power * (atk / def)) / 50.0).floor() + 2.0
}

pub fn stab(attacker: &CombatantProfile, move_def: &MoveDescriptor) -> f64 {
    if attacker.has_type(move_def.type_tag()) {
        1.5
    } else {
        1.0
    }
}

/// One hit's damage. Always at least 1, including against an immune defender.
pub fn compute_damage<R: RollSource + ?Sized>(
    attacker: &CombatantProfile,
    defender: &CombatantProfile,
    move_def: &MoveDescriptor,
    rng: &mut R,
) -> u32 {
    let base = base_damage(attacker, defender, move_def);
    let type_mod = effectiveness(move_def.type_tag(), &defender.types) as f64;
    let rand_mod = random_factor(rng);
    let damage = (base * stab(attacker, move_def) * type_mod * rand_mod).floor();
    damage.max(1.0) as u32
}
