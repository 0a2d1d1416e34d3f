//! Game state tracked alongside an exploration.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{Power, Token};

/// The exploration-relevant game state at one moment in time.
///
/// Powers are boolean capabilities; tokens are counted resources. The
/// `extra` map is open-ended room for game-specific entries that the
/// engine itself never interprets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Powers currently held.
    #[serde(default)]
    pub powers: BTreeSet<Power>,
    /// Token counts by token type.
    #[serde(default)]
    pub tokens: BTreeMap<Token, i64>,
    /// Arbitrary game-specific state.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl GameState {
    /// An empty game state: no powers, no tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the given power is held directly (equivalences are not
    /// consulted; see `has_power_or_equivalent`).
    pub fn has_power(&self, power: &str) -> bool {
        self.powers.contains(power)
    }

    /// Add a power to the held set.
    pub fn gain_power(&mut self, power: impl Into<Power>) {
        self.powers.insert(power.into());
    }

    /// Remove a power from the held set. Does nothing if it was absent.
    pub fn lose_power(&mut self, power: &str) {
        self.powers.remove(power);
    }

    /// The tracked count for a token type, or `None` if that type has
    /// never been acquired or lost.
    pub fn token_count(&self, token: &str) -> Option<i64> {
        self.tokens.get(token).copied()
    }

    /// The effective count for a token type, defaulting to zero.
    pub fn tokens_of(&self, token: &str) -> i64 {
        self.tokens.get(token).copied().unwrap_or(0)
    }

    /// Add to (or, with a negative amount, subtract from) a token count.
    pub fn adjust_tokens(&mut self, token: impl Into<Token>, amount: i64) {
        *self.tokens.entry(token.into()).or_insert(0) += amount;
    }

    /// Overwrite a token count.
    pub fn set_tokens(&mut self, token: impl Into<Token>, amount: i64) {
        self.tokens.insert(token.into(), amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powers() {
        let mut state = GameState::new();
        assert!(!state.has_power("dash"));
        state.gain_power("dash");
        assert!(state.has_power("dash"));
        state.lose_power("dash");
        assert!(!state.has_power("dash"));
        // Losing an absent power is fine
        state.lose_power("dash");
    }

    #[test]
    fn tokens() {
        let mut state = GameState::new();
        assert_eq!(state.token_count("key"), None);
        assert_eq!(state.tokens_of("key"), 0);
        state.adjust_tokens("key", 3);
        assert_eq!(state.token_count("key"), Some(3));
        state.adjust_tokens("key", -1);
        assert_eq!(state.tokens_of("key"), 2);
        state.set_tokens("key", 10);
        assert_eq!(state.tokens_of("key"), 10);
    }
}
