//! Line-delimited JSON request/response loop.
//!
//! Each input line is one request, each output line one response:
//!
//! ```text
//! {"id":1,"method":"simulate_battle","params":{"pokemonA":"pikachu","pokemonB":"eevee"}}
//! {"id":1,"result":{"participants":[...],"log":[...],"result":"pikachu"}}
//! ```

use crate::battle::BattleOptions;
use crate::provider::ProfileProvider;
use crate::service::simulate_battle;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BattleParams {
    pokemon_a: String,
    pokemon_b: String,
    #[serde(default)]
    seed: Option<u64>,
}

/// `name` wins over `id`; with neither the request lists every species.
#[derive(Debug, Default, Deserialize)]
struct DataParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<u32>,
}

impl DataParams {
    fn identifier(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| self.id.map(|id| id.to_string()))
    }
}

const LIST_HINT: &str = "Pass {\"name\": \"pikachu\"} or {\"id\": 25} as params for one species.";

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

enum Call {
    SimulateBattle(BattleParams),
    PokemonData(DataParams),
}

impl Call {
    fn parse(method: &str, params: Value) -> Result<Call, String> {
        match method {
            "simulate_battle" => serde_json::from_value(params)
                .map(Call::SimulateBattle)
                .map_err(|e| format!("invalid params: {e}")),
            "pokemon_data" if params.is_null() => Ok(Call::PokemonData(DataParams::default())),
            "pokemon_data" => serde_json::from_value(params)
                .map(Call::PokemonData)
                .map_err(|e| format!("invalid params: {e}")),
            other => Err(format!("unknown method: {other}")),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    pub max_turns: Option<u32>,
    /// Per-request time limit for a battle.
    pub battle_timeout: Option<Duration>,
}

impl ServerConfig {
    fn battle_options(&self) -> BattleOptions {
        let mut options = BattleOptions::default();
        if let Some(max_turns) = self.max_turns {
            options.max_turns = max_turns;
        }
        options.time_limit = self.battle_timeout;
        options
    }
}

fn error_response(id: Value, message: impl Into<String>) -> Value {
    json!({ "id": id, "error": { "message": message.into() } })
}

/// Answers a single request line. Never fails: errors become error responses.
pub fn handle_line<P: ProfileProvider + ?Sized>(provider: &P, config: &ServerConfig, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            warn!(%err, "rejecting malformed request");
            return error_response(Value::Null, format!("invalid request: {err}"));
        }
    };
    let id = request.id;
    let call = match Call::parse(&request.method, request.params) {
        Ok(call) => call,
        Err(message) => {
            warn!(method = request.method.as_str(), "rejecting request");
            return error_response(id, message);
        }
    };
    let outcome = match call {
        Call::SimulateBattle(params) => {
            info!(a = params.pokemon_a.as_str(), b = params.pokemon_b.as_str(), "simulate_battle");
            simulate_battle(
                provider,
                &params.pokemon_a,
                &params.pokemon_b,
                params.seed,
                config.battle_options(),
            )
            .and_then(|report| Ok(serde_json::to_value(report)?))
        }
        Call::PokemonData(params) => match params.identifier() {
            Some(identifier) => {
                info!(identifier = identifier.as_str(), "pokemon_data");
                provider
                    .pokemon_data(&identifier)
                    .and_then(|data| Ok(serde_json::to_value(data)?))
            }
            None => {
                info!("pokemon_data list");
                provider
                    .species_list()
                    .map(|names| json!({ "results": names, "hint": LIST_HINT }))
            }
        },
    };
    match outcome {
        Ok(result) => json!({ "id": id, "result": result }),
        Err(err) => {
            warn!(%err, "request failed");
            error_response(id, err.to_string())
        }
    }
}

/// Serves requests until `input` is exhausted. Blank lines are skipped.
pub fn serve<P, R, W>(provider: &P, config: &ServerConfig, input: R, mut output: W) -> anyhow::Result<()>
where
    P: ProfileProvider + ?Sized,
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(provider, config, &line);
        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    info!("input closed, server stopping");
    Ok(())
}
