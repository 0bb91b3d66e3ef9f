//! Profile resolution against the public PokeAPI.

use crate::error::{DuelError, Result};
use crate::model::{stat_key, CombatantProfile, MoveCategory, MoveDescriptor, PokemonData};
use crate::provider::{normalize_identifier, ProfileProvider};
use rayon::prelude::*;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://pokeapi.co/api/v2";
/// Only the first moves a species lists are inspected.
pub const MOVE_SCAN_LIMIT: usize = 30;
pub const MOVE_POOL_SIZE: usize = 4;
pub const SPECIES_LIST_LIMIT: usize = 2000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct NamedResource {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiResource {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct StatRecord {
    pub base_stat: u32,
    pub stat: NamedResource,
}

#[derive(Debug, Deserialize)]
pub struct TypeSlot {
    pub slot: u8,
    #[serde(rename = "type")]
    pub type_ref: NamedResource,
}

#[derive(Debug, Deserialize)]
pub struct MoveSlot {
    #[serde(rename = "move")]
    pub move_ref: NamedResource,
}

#[derive(Debug, Deserialize)]
pub struct AbilitySlot {
    pub ability: NamedResource,
}

#[derive(Debug, Deserialize)]
pub struct PokemonRecord {
    #[serde(default)]
    pub id: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub stats: Vec<StatRecord>,
    #[serde(default)]
    pub types: Vec<TypeSlot>,
    #[serde(default)]
    pub moves: Vec<MoveSlot>,
    #[serde(default)]
    pub abilities: Vec<AbilitySlot>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub species: Option<NamedResource>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRecord {
    pub name: String,
    #[serde(default)]
    pub power: Option<u32>,
    #[serde(default)]
    pub accuracy: Option<u32>,
    #[serde(rename = "type", default)]
    pub type_ref: Option<NamedResource>,
    #[serde(default)]
    pub damage_class: Option<NamedResource>,
}

impl MoveRecord {
    /// Damaging moves only: known power and a physical or special class.
    pub fn into_descriptor(self) -> Option<MoveDescriptor> {
        let power = self.power.filter(|p| *p > 0)?;
        let category = match self.damage_class.as_ref()?.name.as_str() {
            "physical" => MoveCategory::Physical,
            "special" => MoveCategory::Special,
            _ => return None,
        };
        Some(MoveDescriptor {
            name: self.name,
            power: Some(power),
            move_type: self.type_ref.map(|t| t.name),
            accuracy: self.accuracy,
            category: Some(category),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SpeciesRecord {
    #[serde(default)]
    pub evolution_chain: Option<ApiResource>,
}

#[derive(Debug, Deserialize)]
pub struct ChainLink {
    pub species: NamedResource,
    #[serde(default)]
    pub evolves_to: Vec<ChainLink>,
}

impl ChainLink {
    /// Depth-first, each stage before the branches that evolve from it.
    fn collect_names(&self, names: &mut Vec<String>) {
        names.push(self.species.name.clone());
        for next in &self.evolves_to {
            next.collect_names(names);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EvolutionChainRecord {
    pub chain: ChainLink,
}

#[derive(Debug, Deserialize)]
pub struct ResourceList {
    #[serde(default)]
    pub results: Vec<NamedResource>,
}

fn type_names(mut types: Vec<TypeSlot>) -> Vec<String> {
    types.sort_by_key(|t| t.slot);
    types.into_iter().map(|t| t.type_ref.name).collect()
}

/// Builds a profile from a species record and its already fetched move records.
pub fn profile_from_records(pokemon: PokemonRecord, moves: Vec<MoveRecord>) -> CombatantProfile {
    let stats: HashMap<String, u32> = pokemon
        .stats
        .into_iter()
        .map(|s| (s.stat.name, s.base_stat))
        .collect();
    let types = type_names(pokemon.types);
    let moves = moves
        .into_iter()
        .filter_map(MoveRecord::into_descriptor)
        .take(MOVE_POOL_SIZE)
        .collect();
    CombatantProfile::new(pokemon.name, stats, types, moves)
}

/// Builds the descriptive record; every learnable move is listed by name.
pub fn data_from_records(pokemon: PokemonRecord, chain: Option<EvolutionChainRecord>) -> PokemonData {
    let mut evolution_chain = Vec::new();
    if let Some(record) = chain {
        record.chain.collect_names(&mut evolution_chain);
    }
    PokemonData {
        id: pokemon.id,
        name: pokemon.name,
        types: type_names(pokemon.types),
        base_stats: pokemon
            .stats
            .into_iter()
            .map(|s| (stat_key(&s.stat.name), s.base_stat))
            .collect(),
        abilities: pokemon.abilities.into_iter().map(|a| a.ability.name).collect(),
        moves: pokemon.moves.into_iter().map(|m| m.move_ref.name).collect(),
        height: pokemon.height,
        weight: pokemon.weight,
        evolution_chain,
    }
}

/// What a 404 means for a request.
#[derive(Clone, Copy, Debug)]
enum Lookup {
    /// The species the caller asked for: 404 is `ProfileNotFound`.
    Subject,
    /// A record linked from the subject: 404 means the source is inconsistent.
    Linked,
}

pub struct PokeApiProvider {
    client: Client,
    base_url: String,
}

impl PokeApiProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DuelError::ProviderUnavailable {
                identifier: base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, identifier: &str, lookup: Lookup) -> Result<T> {
        let unavailable = |reason: String| DuelError::ProviderUnavailable {
            identifier: identifier.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| unavailable(e.to_string()))?;
        match (response.status(), lookup) {
            (StatusCode::NOT_FOUND, Lookup::Subject) => {
                return Err(DuelError::ProfileNotFound {
                    identifier: identifier.to_string(),
                })
            }
            (status, _) if !status.is_success() => {
                return Err(unavailable(format!("request failed {status}: {url}")))
            }
            _ => {}
        }
        let body = response.text().map_err(|e| unavailable(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| DuelError::MalformedProfile {
            identifier: identifier.to_string(),
            reason: e.to_string(),
        })
    }

    fn fetch_pokemon(&self, identifier: &str) -> Result<PokemonRecord> {
        let url = format!("{}/pokemon/{}", self.base_url, normalize_identifier(identifier));
        debug!(url = url.as_str(), "fetching pokemon");
        self.get_json(&url, identifier, Lookup::Subject)
    }

    fn fetch_evolution_chain(&self, pokemon: &PokemonRecord, identifier: &str) -> Result<Option<EvolutionChainRecord>> {
        let species_url = match &pokemon.species {
            Some(species) if !species.url.is_empty() => species.url.clone(),
            _ => format!("{}/pokemon-species/{}", self.base_url, normalize_identifier(identifier)),
        };
        let species: SpeciesRecord = self.get_json(&species_url, identifier, Lookup::Linked)?;
        match species.evolution_chain {
            Some(chain) => self.get_json(&chain.url, identifier, Lookup::Linked).map(Some),
            None => Ok(None),
        }
    }
}

impl ProfileProvider for PokeApiProvider {
    fn resolve(&self, identifier: &str) -> Result<Arc<CombatantProfile>> {
        let pokemon = self.fetch_pokemon(identifier)?;
        let move_urls: Vec<String> = pokemon
            .moves
            .iter()
            .take(MOVE_SCAN_LIMIT)
            .map(|m| m.move_ref.url.clone())
            .collect();
        let moves = move_urls
            .par_iter()
            .map(|move_url| self.get_json::<MoveRecord>(move_url, identifier, Lookup::Linked))
            .collect::<Result<Vec<_>>>()?;
        let profile = profile_from_records(pokemon, moves);
        info!(
            name = profile.name.as_str(),
            moves = profile.moves.len(),
            "resolved profile from PokeAPI"
        );
        Ok(Arc::new(profile))
    }

    fn pokemon_data(&self, identifier: &str) -> Result<PokemonData> {
        let pokemon = self.fetch_pokemon(identifier)?;
        let chain = self.fetch_evolution_chain(&pokemon, identifier)?;
        Ok(data_from_records(pokemon, chain))
    }

    fn species_list(&self) -> Result<Vec<String>> {
        let url = format!("{}/pokemon?limit={}", self.base_url, SPECIES_LIST_LIMIT);
        debug!(url = url.as_str(), "fetching species list");
        let list: ResourceList = self.get_json(&url, "species list", Lookup::Linked)?;
        Ok(list.results.into_iter().map(|r| r.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIKACHU: &str = r#"{
        "name": "pikachu",
        "stats": [
            {"base_stat": 35, "stat": {"name": "hp", "url": ""}},
            {"base_stat": 55, "stat": {"name": "attack", "url": ""}},
            {"base_stat": 90, "stat": {"name": "speed", "url": ""}}
        ],
        "types": [{"slot": 1, "type": {"name": "electric", "url": ""}}],
        "moves": [{"move": {"name": "thunder-shock", "url": "https://example.invalid/move/84/"}}]
    }"#;

    fn record(json: &str) -> MoveRecord {
        serde_json::from_str(json).expect("valid move record")
    }

    #[test]
    fn keeps_first_four_damaging_moves() {
        let pokemon: PokemonRecord = serde_json::from_str(PIKACHU).expect("valid pokemon");
        let moves = vec![
            record(r#"{"name":"growl","power":null,"accuracy":100,"type":{"name":"normal"},"damage_class":{"name":"status"}}"#),
            record(r#"{"name":"thunder-shock","power":40,"accuracy":100,"type":{"name":"electric"},"damage_class":{"name":"special"}}"#),
            record(r#"{"name":"quick-attack","power":40,"accuracy":100,"type":{"name":"normal"},"damage_class":{"name":"physical"}}"#),
            record(r#"{"name":"swift","power":60,"accuracy":null,"type":{"name":"normal"},"damage_class":{"name":"special"}}"#),
            record(r#"{"name":"thunderbolt","power":90,"accuracy":100,"type":{"name":"electric"},"damage_class":{"name":"special"}}"#),
            record(r#"{"name":"thunder","power":110,"accuracy":70,"type":{"name":"electric"},"damage_class":{"name":"special"}}"#),
        ];
        let profile = profile_from_records(pokemon, moves);
        let names: Vec<&str> = profile.moves.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["thunder-shock", "quick-attack", "swift", "thunderbolt"]);
        assert_eq!(profile.moves[2].accuracy, None);
        assert_eq!(profile.speed, 90);
        assert_eq!(profile.types, vec!["electric".to_string()]);
        assert_eq!(profile.max_hp(), 70);
    }

    #[test]
    fn types_follow_slot_order() {
        let raw = r#"{"name":"x","types":[
            {"slot": 2, "type": {"name": "flying"}},
            {"slot": 1, "type": {"name": "fire"}}
        ]}"#;
        let pokemon: PokemonRecord = serde_json::from_str(raw).expect("valid pokemon");
        let profile = profile_from_records(pokemon, vec![]);
        assert_eq!(profile.types, vec!["fire".to_string(), "flying".to_string()]);
        assert_eq!(profile.speed, 50);
    }

    const EEVEE_CHAIN: &str = r#"{"chain": {
        "species": {"name": "eevee", "url": ""},
        "evolves_to": [
            {"species": {"name": "vaporeon", "url": ""}, "evolves_to": []},
            {"species": {"name": "jolteon", "url": ""}, "evolves_to": []},
            {"species": {"name": "flareon", "url": ""}}
        ]
    }}"#;

    #[test]
    fn data_record_lists_everything_the_species_knows() {
        let raw = r#"{
            "id": 133, "name": "eevee", "height": 3, "weight": 65,
            "stats": [
                {"base_stat": 55, "stat": {"name": "hp"}},
                {"base_stat": 45, "stat": {"name": "special-attack"}}
            ],
            "types": [{"slot": 1, "type": {"name": "normal"}}],
            "abilities": [{"ability": {"name": "run-away"}}, {"ability": {"name": "adaptability"}}],
            "moves": [{"move": {"name": "tackle"}}, {"move": {"name": "growl"}}, {"move": {"name": "swift"}}]
        }"#;
        let pokemon: PokemonRecord = serde_json::from_str(raw).expect("valid pokemon");
        let chain: EvolutionChainRecord = serde_json::from_str(EEVEE_CHAIN).expect("valid chain");
        let data = data_from_records(pokemon, Some(chain));
        assert_eq!(data.id, Some(133));
        assert_eq!(data.height, Some(3));
        assert_eq!(data.weight, Some(65));
        assert_eq!(data.base_stats["special_attack"], 45);
        assert_eq!(data.abilities, ["run-away", "adaptability"]);
        // Non-damaging moves are listed too.
        assert_eq!(data.moves, ["tackle", "growl", "swift"]);
        assert_eq!(data.evolution_chain, ["eevee", "vaporeon", "jolteon", "flareon"]);
    }

    #[test]
    fn chain_is_walked_stage_by_stage() {
        let raw = r#"{"chain": {"species": {"name": "oddish"}, "evolves_to": [
            {"species": {"name": "gloom"}, "evolves_to": [
                {"species": {"name": "vileplume"}},
                {"species": {"name": "bellossom"}}
            ]}
        ]}}"#;
        let chain: EvolutionChainRecord = serde_json::from_str(raw).expect("valid chain");
        let pokemon: PokemonRecord = serde_json::from_str(r#"{"name":"gloom"}"#).expect("valid pokemon");
        let data = data_from_records(pokemon, Some(chain));
        assert_eq!(data.evolution_chain, ["oddish", "gloom", "vileplume", "bellossom"]);
    }

    mod http {
        use super::*;
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;
        use std::thread;

        type Routes = HashMap<String, (u16, String)>;

        /// Serves canned responses on a loopback port; unknown paths get a 404.
        fn local_api(build: impl FnOnce(&str) -> Routes) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
            let base = format!("http://{}", listener.local_addr().expect("local addr"));
            let routes = build(&base);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { continue };
                    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
                    let mut request_line = String::new();
                    if reader.read_line(&mut request_line).is_err() {
                        continue;
                    }
                    loop {
                        let mut header = String::new();
                        match reader.read_line(&mut header) {
                            Ok(0) | Err(_) => break,
                            Ok(_) if header.trim().is_empty() => break,
                            Ok(_) => {}
                        }
                    }
                    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                    let (status, body) = routes
                        .get(path)
                        .cloned()
                        .unwrap_or((404, r#"{"detail":"Not found."}"#.to_string()));
                    let reason = match status {
                        200 => "OK",
                        404 => "Not Found",
                        _ => "Internal Server Error",
                    };
                    let response = format!(
                        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes());
                }
            });
            base
        }

        fn route(path: &str, status: u16, body: &str) -> (String, (u16, String)) {
            (path.to_string(), (status, body.to_string()))
        }

        #[test]
        fn unreachable_host_is_unavailable() {
            let provider = PokeApiProvider::new("http://127.0.0.1:1").expect("client builds");
            match provider.resolve("pikachu") {
                Err(DuelError::ProviderUnavailable { identifier, .. }) => assert_eq!(identifier, "pikachu"),
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn status_codes_map_to_errors() {
            let base = local_api(|_| Routes::from([route("/pokemon/glitch", 500, "oops")]));
            let provider = PokeApiProvider::new(base).expect("client builds");
            assert!(matches!(
                provider.resolve("MissingNo"),
                Err(DuelError::ProfileNotFound { identifier }) if identifier == "MissingNo"
            ));
            match provider.resolve("glitch") {
                Err(DuelError::ProviderUnavailable { reason, .. }) => assert!(reason.contains("500"), "{reason}"),
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn missing_move_record_does_not_hide_the_pokemon() {
            let base = local_api(|base| {
                let pikachu = format!(
                    r#"{{"name":"pikachu","moves":[{{"move":{{"name":"thunder-shock","url":"{base}/move/84/"}}}}]}}"#
                );
                Routes::from([route("/pokemon/pikachu", 200, &pikachu)])
            });
            let provider = PokeApiProvider::new(base).expect("client builds");
            assert!(matches!(
                provider.resolve("pikachu"),
                Err(DuelError::ProviderUnavailable { .. })
            ));
        }

        #[test]
        fn resolves_profiles_data_and_species_list() {
            let base = local_api(|base| {
                let pikachu = format!(
                    r#"{{"id":25,"name":"pikachu",
                        "stats":[{{"base_stat":35,"stat":{{"name":"hp"}}}},{{"base_stat":90,"stat":{{"name":"speed"}}}}],
                        "types":[{{"slot":1,"type":{{"name":"electric"}}}}],
                        "abilities":[{{"ability":{{"name":"static"}}}}],
                        "moves":[{{"move":{{"name":"thunder-shock","url":"{base}/move/84/"}}}},
                                 {{"move":{{"name":"growl","url":"{base}/move/45/"}}}}],
                        "species":{{"name":"pikachu","url":"{base}/pokemon-species/25/"}}}}"#
                );
                let species = format!(r#"{{"evolution_chain":{{"url":"{base}/evolution-chain/10/"}}}}"#);
                let chain = r#"{"chain":{"species":{"name":"pichu"},"evolves_to":[
                    {"species":{"name":"pikachu"},"evolves_to":[{"species":{"name":"raichu"}}]}]}}"#;
                Routes::from([
                    route("/pokemon/pikachu", 200, &pikachu),
                    route(
                        "/move/84/",
                        200,
                        r#"{"name":"thunder-shock","power":40,"accuracy":100,"type":{"name":"electric"},"damage_class":{"name":"special"}}"#,
                    ),
                    route(
                        "/move/45/",
                        200,
                        r#"{"name":"growl","power":null,"accuracy":100,"type":{"name":"normal"},"damage_class":{"name":"status"}}"#,
                    ),
                    route("/pokemon-species/25/", 200, &species),
                    route("/evolution-chain/10/", 200, chain),
                    route(
                        "/pokemon?limit=2000",
                        200,
                        r#"{"results":[{"name":"bulbasaur"},{"name":"ivysaur"}]}"#,
                    ),
                ])
            });
            let provider = PokeApiProvider::new(format!("{base}/")).expect("client builds");

            let profile = provider.resolve(" Pikachu ").expect("resolves");
            assert_eq!(profile.speed, 90);
            assert_eq!(profile.moves.len(), 1);
            assert_eq!(profile.moves[0].name, "thunder-shock");

            let data = provider.pokemon_data("pikachu").expect("describes");
            assert_eq!(data.id, Some(25));
            assert_eq!(data.abilities, ["static"]);
            assert_eq!(data.moves, ["thunder-shock", "growl"]);
            assert_eq!(data.evolution_chain, ["pichu", "pikachu", "raichu"]);

            assert_eq!(provider.species_list().expect("lists"), ["bulbasaur", "ivysaur"]);
        }
    }
}
