//! Prompt catalog
//!
//! Immutable mapping from clip slot index to the generation prompt for that
//! slot. The catalog is built once at startup and shared behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

/// Prompts served when no catalog is configured.
pub const DEFAULT_PROMPTS: [&str; 5] = [
    "Calm and relaxing lofi beat with soft piano and gentle rain sounds",
    "Upbeat lofi hip-hop with jazzy guitar and vinyl crackle",
    "Dreamy lofi atmosphere with synth pads and bird chirps",
    "Chill lofi groove with mellow bass and coffee shop ambience",
    "Nostalgic lofi melody with retro game sounds and soft strings",
];

/// Prefix shared by every cache key.
const CACHE_KEY_PREFIX: &str = "lofi_clip";

static DEFAULT_CATALOG: Lazy<Arc<PromptCatalog>> = Lazy::new(|| {
    Arc::new(PromptCatalog::from_prompts(
        DEFAULT_PROMPTS.iter().map(|p| p.to_string()),
    ))
});

/// Logical position in the prompt catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for SlotIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// One catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct SlotEntry {
    pub index: SlotIndex,
    pub prompt: String,
    pub cache_key: String,
}

/// Read-only slot → prompt table.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    entries: Vec<SlotEntry>,
}

impl PromptCatalog {
    /// Build a catalog from prompts in slot order.
    ///
    /// Cache keys embed a digest of the prompt so that a changed prompt never
    /// resolves to a clip generated for its predecessor.
    pub fn from_prompts<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = prompts
            .into_iter()
            .enumerate()
            .map(|(i, prompt)| {
                let prompt = prompt.into();
                let digest = xxh3_64(prompt.as_bytes());
                SlotEntry {
                    index: SlotIndex(i),
                    cache_key: format!("{CACHE_KEY_PREFIX}_{i}_{digest:016x}"),
                    prompt,
                }
            })
            .collect();
        Self { entries }
    }

    /// The built-in five-prompt lofi catalog.
    pub fn default_shared() -> Arc<Self> {
        Arc::clone(&DEFAULT_CATALOG)
    }

    /// Number of slots (`N`).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, slot: SlotIndex) -> bool {
        slot.0 < self.entries.len()
    }

    pub fn get(&self, slot: SlotIndex) -> Option<&SlotEntry> {
        self.entries.get(slot.0)
    }

    pub fn prompt(&self, slot: SlotIndex) -> Option<&str> {
        self.get(slot).map(|entry| entry.prompt.as_str())
    }

    pub fn cache_key(&self, slot: SlotIndex) -> Option<&str> {
        self.get(slot).map(|entry| entry.cache_key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotEntry> {
        self.entries.iter()
    }
}

impl Default for PromptCatalog {
    fn default() -> Self {
        DEFAULT_CATALOG.as_ref().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_has_five_slots() {
        let catalog = PromptCatalog::default_shared();
        assert_eq!(catalog.len(), 5);
        assert!(catalog.contains(SlotIndex::new(4)));
        assert!(!catalog.contains(SlotIndex::new(5)));
        assert_eq!(catalog.prompt(SlotIndex::new(0)), Some(DEFAULT_PROMPTS[0]));
    }

    #[test]
    fn test_cache_keys_are_deterministic_per_slot() {
        let a = PromptCatalog::from_prompts(["rain", "vinyl"]);
        let b = PromptCatalog::from_prompts(["rain", "vinyl"]);
        assert_eq!(a.cache_key(SlotIndex::new(1)), b.cache_key(SlotIndex::new(1)));
        assert_ne!(a.cache_key(SlotIndex::new(0)), a.cache_key(SlotIndex::new(1)));
        assert!(
            a.cache_key(SlotIndex::new(0))
                .unwrap()
                .starts_with("lofi_clip_0_")
        );
    }

    #[test]
    fn test_changed_prompt_changes_key() {
        let before = PromptCatalog::from_prompts(["soft piano"]);
        let after = PromptCatalog::from_prompts(["soft guitar"]);
        assert_ne!(
            before.cache_key(SlotIndex::new(0)),
            after.cache_key(SlotIndex::new(0))
        );
    }

    #[test]
    fn test_out_of_range_lookups() {
        let catalog = PromptCatalog::from_prompts(["only"]);
        assert!(catalog.get(SlotIndex::new(1)).is_none());
        assert!(catalog.prompt(SlotIndex::new(7)).is_none());
    }
}
