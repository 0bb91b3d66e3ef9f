use crate::model::{CombatantProfile, MoveCategory, MoveDescriptor};
use crate::types::effectiveness;
use once_cell::sync::Lazy;

/// Used when a combatant has no usable moves.
pub static DEFAULT_MOVE: Lazy<MoveDescriptor> = Lazy::new(|| MoveDescriptor {
    name: "tackle".to_string(),
    power: Some(40),
    move_type: Some("normal".to_string()),
    accuracy: None,
    category: Some(MoveCategory::Physical),
});

pub fn move_score(move_def: &MoveDescriptor, opponent: &CombatantProfile) -> f32 {
    move_def.base_power() as f32 * effectiveness(move_def.type_tag(), &opponent.types)
}

/// Picks the move with the best `power * effectiveness` against `opponent`.
/// Ties go to the earliest move in the pool.
pub fn choose_move<'a>(attacker: &'a CombatantProfile, opponent: &CombatantProfile) -> &'a MoveDescriptor {
    let mut best: Option<(&MoveDescriptor, f32)> = None;
    for candidate in &attacker.moves {
        let score = move_score(candidate, opponent);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((candidate, score)),
        }
    }
    match best {
        Some((chosen, _)) => chosen,
        None => &*DEFAULT_MOVE,
    }
}
