//! One-on-one Pokemon battle simulator.
//!
//! Combatant profiles come from a [`provider::ProfileProvider`]; the battle itself
//! is played by [`battle::Battle`] and summarised as a [`battle::BattleReport`].

pub mod ai;
pub mod battle;
pub mod damage;
pub mod error;
pub mod model;
pub mod pokeapi;
pub mod provider;
pub mod server;
pub mod service;
pub mod status;
pub mod tally;
pub mod types;

use crate::battle::BattleOptions;
use crate::pokeapi::PokeApiProvider;
use crate::provider::{CachedProvider, JsonFileProvider, ProfileProvider};
use crate::server::ServerConfig;
pub use crate::error::{DuelError, Result};
pub use crate::service::simulate_battle;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Command {
    Battle { a: String, b: String },
    Tally { a: String, b: String, runs: usize },
    /// Species record for `name`, or the species list without one.
    Data { name: Option<String> },
    Serve,
}

#[derive(Debug, Clone)]
pub struct CliOptions {
    pub command: Command,
    pub profiles_path: Option<PathBuf>,
    pub api_base: String,
    pub cache_ttl: Duration,
    pub seed: Option<u64>,
    pub max_turns: u32,
    /// Per-battle wall-clock budget, started once both profiles are resolved.
    pub time_limit: Option<Duration>,
    pub json: bool,
}

impl CliOptions {
    fn battle_options(&self) -> BattleOptions {
        BattleOptions {
            max_turns: self.max_turns,
            time_limit: self.time_limit,
            ..BattleOptions::default()
        }
    }
}

pub fn build_provider(opts: &CliOptions) -> anyhow::Result<Box<dyn ProfileProvider>> {
    let provider: Box<dyn ProfileProvider> = match &opts.profiles_path {
        Some(path) => Box::new(JsonFileProvider::load(path)?),
        None => Box::new(CachedProvider::new(
            PokeApiProvider::new(opts.api_base.clone())?,
            opts.cache_ttl,
        )),
    };
    Ok(provider)
}

pub fn run(opts: CliOptions) -> anyhow::Result<()> {
    let provider = build_provider(&opts)?;
    match &opts.command {
        Command::Battle { a, b } => {
            let report = simulate_battle(&provider, a, b, opts.seed, opts.battle_options())?;
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for line in &report.log {
                    println!("{line}");
                }
                println!("Result: {}", report.result);
            }
        }
        Command::Tally { a, b, runs } => {
            if *runs == 0 {
                anyhow::bail!("--runs must be > 0");
            }
            let (profile_a, profile_b) = service::resolve_pair(&provider, a, b)?;
            let seed = opts.seed.unwrap_or_else(rand::random);
            let summary = tally::tally(&profile_a, &profile_b, *runs, seed, &opts.battle_options())?;
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "{} vs {} over {} battles: {} wins, {} losses, {} draws ({:.4} win rate)",
                    profile_a.name,
                    profile_b.name,
                    summary.runs,
                    summary.a_wins,
                    summary.b_wins,
                    summary.draws,
                    summary.win_rate_a()
                );
            }
        }
        Command::Data { name } => {
            let value = match name {
                Some(name) => serde_json::to_value(provider.pokemon_data(name)?)?,
                None => serde_json::to_value(provider.species_list()?)?,
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Serve => {
            let config = ServerConfig {
                max_turns: Some(opts.max_turns),
                battle_timeout: opts.time_limit,
            };
            let stdin = io::stdin();
            server::serve(&provider, &config, stdin.lock(), io::stdout().lock())?;
        }
    }
    Ok(())
}
