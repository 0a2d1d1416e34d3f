//! Transition effects: state mutations attached to a transition.
//!
//! Effects fire when a transition is taken. Gains and losses adjust
//! powers and tokens; toggles cycle through a power list; deactivate
//! closes the transition behind the traveler; edit runs a scripted
//! command block. Effects may carry `charges` (fire only so many times)
//! and `delay` (count down before firing at all). Toggle and edit are
//! stateful: firing them rotates their internal lists.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::types::{Power, Token};

/// Something gained or lost: a power, or a quantity of tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boon {
    Power(Power),
    Tokens(Token, i64),
}

impl Boon {
    /// A power boon.
    pub fn power(name: impl Into<Power>) -> Self {
        Boon::Power(name.into())
    }

    /// A token boon with an amount.
    pub fn tokens(name: impl Into<Token>, amount: i64) -> Self {
        Boon::Tokens(name.into(), amount)
    }
}

/// The kind-specific payload of a transition effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Gain a power or tokens.
    Gain(Boon),
    /// Lose a power or spend tokens.
    Lose(Boon),
    /// With one power: flip its membership. With several: turn all off,
    /// the first on, then rotate the list by one so repeated firings
    /// cycle through the options.
    Toggle(Vec<Power>),
    /// Set the requirement of the transition this effect rides on to
    /// `Impossible`.
    Deactivate,
    /// Command blocks run round-robin: each firing runs the first block,
    /// then rotates it to the back.
    Edit(Vec<Vec<Command>>),
}

/// One effect of a transition, with optional charge and delay counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEffect {
    pub kind: EffectKind,
    /// Remaining firings; decremented each activation, no-op at zero.
    pub charges: Option<u32>,
    /// Activations to skip (decrementing) before the effect fires.
    pub delay: Option<u32>,
}

impl TransitionEffect {
    fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            charges: None,
            delay: None,
        }
    }

    /// A gain effect.
    pub fn gain(boon: Boon) -> Self {
        Self::new(EffectKind::Gain(boon))
    }

    /// A lose effect.
    pub fn lose(boon: Boon) -> Self {
        Self::new(EffectKind::Lose(boon))
    }

    /// A toggle effect over the given powers.
    pub fn toggle(powers: Vec<Power>) -> Self {
        Self::new(EffectKind::Toggle(powers))
    }

    /// A deactivate effect.
    pub fn deactivate() -> Self {
        Self::new(EffectKind::Deactivate)
    }

    /// An edit effect running the given command blocks round-robin.
    pub fn edit(blocks: Vec<Vec<Command>>) -> Self {
        Self::new(EffectKind::Edit(blocks))
    }

    /// Builder: limit the number of firings.
    pub fn with_charges(mut self, charges: u32) -> Self {
        self.charges = Some(charges);
        self
    }

    /// Builder: delay the first firing.
    pub fn with_delay(mut self, delay: u32) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Whether this effect is a plain gain/lose with no counters, and so
    /// eligible for pooling during a merge.
    fn poolable(&self) -> bool {
        self.charges.is_none()
            && self.delay.is_none()
            && matches!(self.kind, EffectKind::Gain(_) | EffectKind::Lose(_))
    }
}

/// Merge two effect lists.
///
/// Gains and losses without charges or delay are pooled: power
/// gains/losses deduplicate (powers are boolean), token gains/losses sum
/// their amounts per token type. Every other effect passes through
/// unmodified, in a-then-b order, ahead of the pooled entries. Cross-type
/// ordering doesn't matter because application is phased (gains, then
/// losses, then toggles, deactivates, edits).
pub fn merge_effects(a: &[TransitionEffect], b: &[TransitionEffect]) -> Vec<TransitionEffect> {
    let mut result = Vec::new();

    let mut power_gains: BTreeSet<Power> = BTreeSet::new();
    let mut power_losses: BTreeSet<Power> = BTreeSet::new();
    let mut token_gains: BTreeMap<Token, i64> = BTreeMap::new();
    let mut token_losses: BTreeMap<Token, i64> = BTreeMap::new();

    for effect in a.iter().chain(b.iter()) {
        if !effect.poolable() {
            result.push(effect.clone());
            continue;
        }
        match &effect.kind {
            EffectKind::Gain(Boon::Power(power)) => {
                power_gains.insert(power.clone());
            }
            EffectKind::Gain(Boon::Tokens(token, amount)) => {
                *token_gains.entry(token.clone()).or_insert(0) += amount;
            }
            EffectKind::Lose(Boon::Power(power)) => {
                power_losses.insert(power.clone());
            }
            EffectKind::Lose(Boon::Tokens(token, amount)) => {
                *token_losses.entry(token.clone()).or_insert(0) += amount;
            }
            _ => unreachable!("poolable is restricted to gain/lose"),
        }
    }

    for power in power_gains {
        result.push(TransitionEffect::gain(Boon::Power(power)));
    }
    for power in power_losses {
        result.push(TransitionEffect::lose(Boon::Power(power)));
    }
    for (token, amount) in token_gains {
        result.push(TransitionEffect::gain(Boon::Tokens(token, amount)));
    }
    for (token, amount) in token_losses {
        result.push(TransitionEffect::lose(Boon::Tokens(token, amount)));
    }

    result
}
