use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_MOVE_POWER: u32 = 40;
pub const DEFAULT_MOVE_TYPE: &str = "normal";
const DEFAULT_BASE_HP: u32 = 60;
const DEFAULT_SPEED: u32 = 50;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveCategory {
    Physical,
    Special,
}

/// A damaging move as the provider describes it. Absent fields keep their
/// provider meaning; defaults are applied by the accessors below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<u32>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub move_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<MoveCategory>,
}

impl MoveDescriptor {
    pub fn base_power(&self) -> u32 {
        self.power.unwrap_or(DEFAULT_MOVE_POWER)
    }

    pub fn type_tag(&self) -> &str {
        self.move_type.as_deref().unwrap_or(DEFAULT_MOVE_TYPE)
    }

    pub fn damage_class(&self) -> MoveCategory {
        self.category.unwrap_or(MoveCategory::Physical)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ProfileRecord")]
pub struct CombatantProfile {
    pub name: String,
    pub stats: HashMap<String, u32>,
    pub types: Vec<String>,
    pub moves: Vec<MoveDescriptor>,
    pub speed: u32,
}

// Wire shape: `speed` may be omitted and is then read from the stat map.
#[derive(Deserialize)]
struct ProfileRecord {
    name: String,
    #[serde(default)]
    stats: HashMap<String, u32>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    moves: Vec<MoveDescriptor>,
    #[serde(default)]
    speed: Option<u32>,
}

impl From<ProfileRecord> for CombatantProfile {
    fn from(raw: ProfileRecord) -> Self {
        let mut profile = CombatantProfile::new(raw.name, raw.stats, raw.types, raw.moves);
        if let Some(speed) = raw.speed {
            profile.speed = speed;
        }
        profile
    }
}

impl CombatantProfile {
    pub fn new(
        name: impl Into<String>,
        stats: HashMap<String, u32>,
        types: Vec<String>,
        moves: Vec<MoveDescriptor>,
    ) -> Self {
        let speed = stats.get("speed").copied().unwrap_or(DEFAULT_SPEED);
        Self {
            name: name.into(),
            stats,
            types,
            moves,
            speed,
        }
    }

    pub fn stat(&self, name: &str, default: u32) -> u32 {
        self.stats.get(name).copied().unwrap_or(default)
    }

    /// Saturates at `u32::MAX` for absurd base HP.
    pub fn max_hp(&self) -> u32 {
        self.stat("hp", DEFAULT_BASE_HP).saturating_mul(2)
    }

    pub fn has_type(&self, tag: &str) -> bool {
        self.types.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn participant(&self) -> Participant {
        Participant {
            name: self.name.clone(),
            types: self.types.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub types: Vec<String>,
}

/// Descriptive species record served by the `pokemon_data` request.
///
/// Stat keys use underscores (`special_attack`). Fields a source cannot supply
/// stay `None` or empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PokemonData {
    pub id: Option<u32>,
    pub name: String,
    pub types: Vec<String>,
    pub base_stats: BTreeMap<String, u32>,
    pub abilities: Vec<String>,
    pub moves: Vec<String>,
    pub height: Option<u32>,
    pub weight: Option<u32>,
    pub evolution_chain: Vec<String>,
}

pub fn stat_key(name: &str) -> String {
    name.replace('-', "_")
}

impl PokemonData {
    /// Everything a battle profile knows; the rest stays unset.
    pub fn from_profile(profile: &CombatantProfile) -> Self {
        let mut base_stats: BTreeMap<String, u32> = profile
            .stats
            .iter()
            .map(|(name, value)| (stat_key(name), *value))
            .collect();
        base_stats.insert("speed".to_string(), profile.speed);
        Self {
            id: None,
            name: profile.name.clone(),
            types: profile.types.clone(),
            base_stats,
            abilities: Vec::new(),
            moves: profile.moves.iter().map(|m| m.name.clone()).collect(),
            height: None,
            weight: None,
            evolution_chain: Vec::new(),
        }
    }
}
