//! Sources of combatant profiles.

use crate::error::{DuelError, Result};
use crate::model::{CombatantProfile, PokemonData};
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Resolves an identifier (name or national dex number) to a profile.
pub trait ProfileProvider: Send + Sync {
    fn resolve(&self, identifier: &str) -> Result<Arc<CombatantProfile>>;

    /// Descriptive record for one species. Sources without richer data
    /// describe the battle profile.
    fn pokemon_data(&self, identifier: &str) -> Result<PokemonData> {
        self.resolve(identifier)
            .map(|profile| PokemonData::from_profile(&profile))
    }

    /// Every identifier the source can resolve, or empty if it cannot enumerate.
    fn species_list(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

impl<P: ProfileProvider + ?Sized> ProfileProvider for Arc<P> {
    fn resolve(&self, identifier: &str) -> Result<Arc<CombatantProfile>> {
        (**self).resolve(identifier)
    }

    fn pokemon_data(&self, identifier: &str) -> Result<PokemonData> {
        (**self).pokemon_data(identifier)
    }

    fn species_list(&self) -> Result<Vec<String>> {
        (**self).species_list()
    }
}

impl<P: ProfileProvider + ?Sized> ProfileProvider for Box<P> {
    fn resolve(&self, identifier: &str) -> Result<Arc<CombatantProfile>> {
        (**self).resolve(identifier)
    }

    fn pokemon_data(&self, identifier: &str) -> Result<PokemonData> {
        (**self).pokemon_data(identifier)
    }

    fn species_list(&self) -> Result<Vec<String>> {
        (**self).species_list()
    }
}

pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_ascii_lowercase()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfilesFile {
    Keyed(HashMap<String, CombatantProfile>),
    Listed(Vec<CombatantProfile>),
}

/// Profiles known up front, typically loaded from a JSON file.
#[derive(Debug, Default)]
pub struct JsonFileProvider {
    profiles: HashMap<String, Arc<CombatantProfile>>,
}

impl JsonFileProvider {
    pub fn from_profiles(profiles: impl IntoIterator<Item = CombatantProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|p| (normalize_identifier(&p.name), Arc::new(p)))
            .collect();
        Self { profiles }
    }

    /// Accepts either an object keyed by identifier or a list of profiles.
    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: ProfilesFile = serde_json::from_str(raw)?;
        let provider = match parsed {
            ProfilesFile::Listed(list) => Self::from_profiles(list),
            ProfilesFile::Keyed(map) => Self {
                profiles: map
                    .into_iter()
                    .map(|(key, p)| (normalize_identifier(&key), Arc::new(p)))
                    .collect(),
            },
        };
        Ok(provider)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profiles file at {}", path.display()))?;
        let provider = Self::from_json(&raw)
            .with_context(|| format!("Failed to parse profiles from {}", path.display()))?;
        info!(count = provider.len(), path = %path.display(), "loaded profiles");
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl ProfileProvider for JsonFileProvider {
    fn resolve(&self, identifier: &str) -> Result<Arc<CombatantProfile>> {
        self.profiles
            .get(&normalize_identifier(identifier))
            .cloned()
            .ok_or_else(|| DuelError::ProfileNotFound {
                identifier: identifier.to_string(),
            })
    }

    fn species_list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

struct CacheEntry {
    profile: Arc<CombatantProfile>,
    expires_at: Instant,
}

/// TTL cache in front of another provider. Failures are never cached.
pub struct CachedProvider<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl<P: ProfileProvider> CachedProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, key: &str) -> Option<Arc<CombatantProfile>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.profile.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: String, profile: Arc<CombatantProfile>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                profile,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}

impl<P: ProfileProvider> ProfileProvider for CachedProvider<P> {
    fn resolve(&self, identifier: &str) -> Result<Arc<CombatantProfile>> {
        let key = normalize_identifier(identifier);
        if let Some(hit) = self.lookup(&key) {
            debug!(identifier = key.as_str(), "profile cache hit");
            return Ok(hit);
        }
        debug!(identifier = key.as_str(), "profile cache miss");
        let profile = self.inner.resolve(&key)?;
        self.store(key, profile.clone());
        Ok(profile)
    }

    // Only battle profiles are cached; descriptive lookups go straight through.
    fn pokemon_data(&self, identifier: &str) -> Result<PokemonData> {
        self.inner.pokemon_data(identifier)
    }

    fn species_list(&self) -> Result<Vec<String>> {
        self.inner.species_list()
    }
}
