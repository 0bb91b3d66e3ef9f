//! Turn orchestration for a single one-on-one battle.

use crate::ai::choose_move;
use crate::damage::{compute_damage, RollSource};
use crate::error::{DuelError, Result};
use crate::model::{CombatantProfile, MoveDescriptor, Participant};
use crate::status::{effective_speed, is_fully_paralyzed, residual_damage, try_afflict, Status};
use crate::types::effectiveness;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const MAX_TURNS: u32 = 100;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BattleOutcome {
    Winner(Side),
    Draw,
}

/// Shared flag that stops a running battle at the next turn boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct BattleOptions {
    /// Last turn that is played before the HP comparison decides the battle.
    pub max_turns: u32,
    pub deadline: Option<Instant>,
    /// Wall-clock budget counted from the moment [`Battle::run`] starts.
    pub time_limit: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl Default for BattleOptions {
    fn default() -> Self {
        Self {
            max_turns: MAX_TURNS,
            deadline: None,
            time_limit: None,
            cancel: None,
        }
    }
}

/// Result handed back to callers; serializes as `{participants, log, result}`.
#[derive(Clone, Debug, Serialize)]
pub struct BattleReport {
    pub participants: [Participant; 2],
    pub log: Vec<String>,
    /// Winner name or `"draw"`.
    pub result: String,
    #[serde(skip)]
    pub outcome: BattleOutcome,
    #[serde(skip)]
    pub turns: u32,
}

#[derive(Clone, Debug)]
struct Combatant<'p> {
    profile: &'p CombatantProfile,
    hp: u32,
    max_hp: u32,
    status: Option<Status>,
}

impl<'p> Combatant<'p> {
    fn new(profile: &'p CombatantProfile) -> Self {
        let max_hp = profile.max_hp();
        Self {
            profile,
            hp: max_hp,
            max_hp,
            status: None,
        }
    }

    fn name(&self) -> &'p str {
        &self.profile.name
    }

    fn is_fainted(&self) -> bool {
        self.hp == 0
    }

    fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }
}

pub struct Battle<'p, R: RollSource> {
    a: Combatant<'p>,
    b: Combatant<'p>,
    turn: u32,
    log: Vec<String>,
    rng: R,
    options: BattleOptions,
}

impl<'p> Battle<'p, SmallRng> {
    pub fn seeded(a: &'p CombatantProfile, b: &'p CombatantProfile, seed: u64) -> Self {
        Battle::new(a, b, SmallRng::seed_from_u64(seed))
    }
}

impl<'p, R: RollSource> Battle<'p, R> {
    pub fn new(a: &'p CombatantProfile, b: &'p CombatantProfile, rng: R) -> Self {
        Battle {
            a: Combatant::new(a),
            b: Combatant::new(b),
            turn: 1,
            log: Vec::new(),
            rng,
            options: BattleOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BattleOptions) -> Self {
        self.options = options;
        self
    }

    fn combatant(&self, side: Side) -> &Combatant<'p> {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    #[cfg(test)]
    fn combatant_mut(&mut self, side: Side) -> &mut Combatant<'p> {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    pub fn hp(&self, side: Side) -> u32 {
        self.combatant(side).hp
    }

    pub fn max_hp(&self, side: Side) -> u32 {
        self.combatant(side).max_hp
    }

    pub fn status(&self, side: Side) -> Option<Status> {
        self.combatant(side).status
    }

    /// Inflicts a status directly, bypassing the affliction roll.
    #[cfg(test)]
    pub(crate) fn set_status(&mut self, side: Side, status: Option<Status>) {
        self.combatant_mut(side).status = status;
    }

    /// Turn that will be played next.
    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    fn any_fainted(&self) -> bool {
        self.a.is_fainted() || self.b.is_fainted()
    }

    pub fn is_over(&self) -> bool {
        self.any_fainted() || self.turn > self.options.max_turns
    }

    /// Sides in acting order. Equal effective speed favours side A.
    pub fn action_order(&self) -> [Side; 2] {
        let speed_a = effective_speed(self.a.profile.speed, self.a.status);
        let speed_b = effective_speed(self.b.profile.speed, self.b.status);
        if speed_a >= speed_b {
            [Side::A, Side::B]
        } else {
            [Side::B, Side::A]
        }
    }

    /// Plays one full round and advances the turn counter.
    pub fn run_turn(&mut self) {
        self.log.push(format!("-- Turn {} --", self.turn));
        let move_a = choose_move(self.a.profile, self.b.profile);
        let move_b = choose_move(self.b.profile, self.a.profile);
        for side in self.action_order() {
            if self.any_fainted() {
                break;
            }
            let chosen = match side {
                Side::A => move_a,
                Side::B => move_b,
            };
            self.take_action(side, chosen);
            if self.any_fainted() {
                break;
            }
            self.apply_residual(side.opponent());
        }
        self.log.push(format!(
            "{}: {}/{} HP | {}: {}/{} HP",
            self.a.name(),
            self.a.hp,
            self.a.max_hp,
            self.b.name(),
            self.b.hp,
            self.b.max_hp
        ));
        self.turn += 1;
    }

    fn take_action(&mut self, side: Side, move_def: &MoveDescriptor) {
        let (attacker, defender) = match side {
            Side::A => (&mut self.a, &mut self.b),
            Side::B => (&mut self.b, &mut self.a),
        };
        let rng = &mut self.rng;
        let log = &mut self.log;

        if is_fully_paralyzed(attacker.status, rng) {
            log.push(format!("{} is fully paralyzed and can't move!", attacker.name()));
            return;
        }
        // An accuracy of 0 is treated like no accuracy at all.
        if let Some(accuracy) = move_def.accuracy.filter(|acc| *acc > 0) {
            if rng.roll() * 100.0 > accuracy as f64 {
                log.push(format!("{} used {}, but it missed!", attacker.name(), move_def.name));
                return;
            }
        }

        let damage = compute_damage(attacker.profile, defender.profile, move_def, rng);
        defender.take_damage(damage);
        let eff = effectiveness(move_def.type_tag(), &defender.profile.types);
        let line = format!("{} used {} and dealt {} damage.", attacker.name(), move_def.name, damage);
        match effectiveness_note(eff) {
            Some(note) => log.push(format!("{line} {note}")),
            None => log.push(line),
        }

        if let Some(inflicted) = try_afflict(&mut defender.status, move_def.type_tag(), rng) {
            log.push(format!("{} is afflicted by {}!", defender.name(), inflicted));
        }
    }

    fn apply_residual(&mut self, side: Side) {
        let target = match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        };
        let Some(loss) = residual_damage(target.status, target.max_hp) else {
            return;
        };
        target.take_damage(loss);
        let line = match target.status {
            Some(Status::Burn) => format!("{} is hurt by its burn!", target.name()),
            _ => format!("{} is hurt by poison!", target.name()),
        };
        self.log.push(line);
    }

    pub fn outcome(&self) -> BattleOutcome {
        match (self.a.is_fainted(), self.b.is_fainted()) {
            (false, true) => BattleOutcome::Winner(Side::A),
            (true, false) => BattleOutcome::Winner(Side::B),
            _ => match self.a.hp.cmp(&self.b.hp) {
                std::cmp::Ordering::Equal => BattleOutcome::Draw,
                std::cmp::Ordering::Greater => BattleOutcome::Winner(Side::A),
                std::cmp::Ordering::Less => BattleOutcome::Winner(Side::B),
            },
        }
    }

    fn check_interrupt(&self) -> Result<()> {
        let cancelled = self
            .options
            .cancel
            .as_ref()
            .is_some_and(CancelToken::is_cancelled);
        let expired = self
            .options
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline);
        if cancelled || expired {
            warn!(turn = self.turn, cancelled, expired, "battle interrupted");
            return Err(DuelError::Cancelled { turn: self.turn });
        }
        Ok(())
    }

    /// Runs to completion, honouring the cancel token and deadline between turns.
    pub fn run(mut self) -> Result<BattleReport> {
        if let Some(limit) = self.options.time_limit {
            let expires = Instant::now() + limit;
            self.options.deadline = Some(self.options.deadline.map_or(expires, |d| d.min(expires)));
        }
        while !self.is_over() {
            self.check_interrupt()?;
            self.run_turn();
        }
        Ok(self.into_report())
    }

    /// Runs to completion ignoring any cancel token, deadline or time limit.
    pub fn play_out(mut self) -> BattleReport {
        while !self.is_over() {
            self.run_turn();
        }
        self.into_report()
    }

    pub fn into_report(self) -> BattleReport {
        let outcome = self.outcome();
        let result = match outcome {
            BattleOutcome::Winner(side) => self.combatant(side).name().to_string(),
            BattleOutcome::Draw => "draw".to_string(),
        };
        let turns = self.turn - 1;
        debug!(
            a = self.a.name(),
            b = self.b.name(),
            turns,
            result = result.as_str(),
            "battle concluded"
        );
        BattleReport {
            participants: [self.a.profile.participant(), self.b.profile.participant()],
            log: self.log,
            result,
            outcome,
            turns,
        }
    }
}

fn effectiveness_note(eff: f32) -> Option<&'static str> {
    if eff > 1.0 {
        Some("It's super effective!")
    } else if eff > 0.0 && eff < 1.0 {
        Some("It's not very effective...")
    } else if eff == 0.0 {
        Some("It doesn't affect the foe...")
    } else {
        None
    }
}

/// Seeded one-shot simulation.
pub fn simulate(a: &CombatantProfile, b: &CombatantProfile, seed: u64) -> BattleReport {
    Battle::seeded(a, b, seed).play_out()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::FixedRoll;
    use crate::model::MoveCategory;
    use std::collections::HashMap;

    fn mon(name: &str, hp: u32, speed: u32, types: &[&str], moves: Vec<MoveDescriptor>) -> CombatantProfile {
        let stats = HashMap::from([
            ("hp".to_string(), hp),
            ("attack".to_string(), 80),
            ("defense".to_string(), 80),
            ("special-attack".to_string(), 80),
            ("special-defense".to_string(), 80),
            ("speed".to_string(), speed),
        ]);
        CombatantProfile::new(name, stats, types.iter().map(|t| t.to_string()).collect(), moves)
    }

    fn strike(move_type: &str, power: u32) -> MoveDescriptor {
        MoveDescriptor {
            name: format!("{move_type}-strike"),
            power: Some(power),
            move_type: Some(move_type.to_string()),
            accuracy: Some(100),
            category: Some(MoveCategory::Physical),
        }
    }

    #[test]
    fn faster_side_opens_each_turn() {
        let fast = mon("fast", 100, 100, &["normal"], vec![strike("normal", 40)]);
        let slow = mon("slow", 100, 50, &["normal"], vec![strike("normal", 40)]);
        let mut battle = Battle::new(&slow, &fast, FixedRoll(0.5));
        battle.run_turn();
        assert_eq!(battle.log()[0], "-- Turn 1 --");
        assert!(battle.log()[1].starts_with("fast used"));
        assert!(battle.log()[2].starts_with("slow used"));
    }

    #[test]
    fn speed_tie_goes_to_side_a() {
        let a = mon("left", 100, 70, &["normal"], vec![]);
        let b = mon("right", 100, 70, &["normal"], vec![]);
        let battle = Battle::new(&a, &b, FixedRoll(0.5));
        assert_eq!(battle.action_order(), [Side::A, Side::B]);
    }

    #[test]
    fn paralysis_can_flip_turn_order() {
        let a = mon("left", 100, 100, &["normal"], vec![]);
        let b = mon("right", 100, 60, &["normal"], vec![]);
        let mut battle = Battle::new(&a, &b, FixedRoll(0.5));
        battle.set_status(Side::A, Some(Status::Paralysis));
        assert_eq!(battle.action_order(), [Side::B, Side::A]);
    }

    #[test]
    fn fully_paralyzed_side_skips_its_move() {
        let a = mon("left", 100, 100, &["normal"], vec![strike("normal", 40)]);
        let b = mon("right", 100, 10, &["normal"], vec![strike("normal", 40)]);
        let mut battle = Battle::new(&a, &b, FixedRoll(0.1));
        battle.set_status(Side::A, Some(Status::Paralysis));
        battle.run_turn();
        assert!(battle
            .log()
            .iter()
            .any(|line| line == "left is fully paralyzed and can't move!"));
        assert_eq!(battle.hp(Side::B), battle.max_hp(Side::B));
    }

    #[test]
    fn residual_hits_the_target_after_each_action() {
        let a = mon("left", 100, 100, &["normal"], vec![strike("normal", 10)]);
        let b = mon("right", 100, 10, &["normal"], vec![strike("normal", 10)]);
        let mut battle = Battle::new(&a, &b, FixedRoll(0.5));
        battle.set_status(Side::B, Some(Status::Poison));
        battle.run_turn();
        let lines = battle.log();
        assert!(lines[1].starts_with("left used"));
        assert_eq!(lines[2], "right is hurt by poison!");
        assert!(lines[3].starts_with("right used"));
        assert!(lines[4].starts_with("left: "));
    }

    #[test]
    fn low_accuracy_misses_against_fixed_roll() {
        let mut shaky = strike("normal", 40);
        shaky.accuracy = Some(30);
        let a = mon("left", 100, 100, &["normal"], vec![shaky]);
        let b = mon("right", 100, 10, &["normal"], vec![]);
        let mut battle = Battle::new(&a, &b, FixedRoll(0.5));
        battle.run_turn();
        assert_eq!(battle.log()[1], "left used normal-strike, but it missed!");
    }

    #[test]
    fn cancelled_token_stops_before_first_turn() {
        let a = mon("left", 100, 100, &["normal"], vec![]);
        let b = mon("right", 100, 10, &["normal"], vec![]);
        let token = CancelToken::new();
        token.cancel();
        let options = BattleOptions {
            cancel: Some(token),
            ..BattleOptions::default()
        };
        let err = Battle::new(&a, &b, FixedRoll(0.5))
            .with_options(options)
            .run()
            .expect_err("battle should be cancelled");
        assert!(matches!(err, DuelError::Cancelled { turn: 1 }));
    }

    #[test]
    fn time_limit_starts_when_the_battle_runs() {
        let a = mon("left", 100, 100, &["normal"], vec![]);
        let b = mon("right", 100, 10, &["normal"], vec![]);
        let zero = BattleOptions {
            time_limit: Some(Duration::ZERO),
            ..BattleOptions::default()
        };
        let err = Battle::new(&a, &b, FixedRoll(0.5))
            .with_options(zero)
            .run()
            .expect_err("no time at all");
        assert!(matches!(err, DuelError::Cancelled { turn: 1 }));

        let generous = BattleOptions {
            time_limit: Some(Duration::from_secs(60)),
            ..BattleOptions::default()
        };
        let report = Battle::new(&a, &b, FixedRoll(0.5))
            .with_options(generous)
            .run()
            .expect("plenty of time");
        assert_eq!(report.result, "left");
    }

    #[test]
    fn effectiveness_notes() {
        assert_eq!(effectiveness_note(4.0), Some("It's super effective!"));
        assert_eq!(effectiveness_note(0.25), Some("It's not very effective..."));
        assert_eq!(effectiveness_note(0.0), Some("It doesn't affect the foe..."));
        assert_eq!(effectiveness_note(1.0), None);
    }
}
