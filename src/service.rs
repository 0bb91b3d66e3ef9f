use crate::battle::{Battle, BattleOptions, BattleReport};
use crate::error::Result;
use crate::model::CombatantProfile;
use crate::provider::ProfileProvider;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

/// Resolves both combatants concurrently. Side A's error wins if both fail.
pub fn resolve_pair<P: ProfileProvider + ?Sized>(
    provider: &P,
    name_a: &str,
    name_b: &str,
) -> Result<(Arc<CombatantProfile>, Arc<CombatantProfile>)> {
    let (a, b) = rayon::join(|| provider.resolve(name_a), || provider.resolve(name_b));
    Ok((a?, b?))
}

/// Resolves both names and plays the battle out.
///
/// `seed` of `None` draws the battle seed from OS entropy.
pub fn simulate_battle<P: ProfileProvider + ?Sized>(
    provider: &P,
    name_a: &str,
    name_b: &str,
    seed: Option<u64>,
    options: BattleOptions,
) -> Result<BattleReport> {
    let (a, b) = resolve_pair(provider, name_a, name_b)?;
    let rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    info!(a = a.name.as_str(), b = b.name.as_str(), ?seed, "starting battle");
    Battle::new(&a, &b, rng).with_options(options).run()
}
