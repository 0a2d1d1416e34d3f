//! The exploration history: an append-only sequence of steps.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use wayfarer_core::effect::{Boon, EffectKind, TransitionEffect};
use wayfarer_core::requirement::{has_power_or_equivalent, Requirement};
use wayfarer_core::state::GameState;
use wayfarer_core::types::{Annotation, Decision, Tag, Transition, Zone};
use wayfarer_core::Command;
use wayfarer_graph::{DecisionGraph, GraphError, ReplaceOptions, ZonePlacement};
use wayfarer_script::{run_command_block, Scope, Value};

use crate::error::{ExploreError, TransitionBlocked};
use crate::step::{Step, START_TRANSITION};

/// One observed connection at a decision: a bare transition to fresh
/// unknown territory, a transition toward a (possibly not-yet-existing)
/// named destination, or the same plus an explicit reciprocal name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObserveEntry {
    Transition(Transition),
    ToDecision(Transition, Decision),
    WithReciprocal(Transition, Decision, Transition),
}

impl From<&str> for ObserveEntry {
    fn from(name: &str) -> Self {
        ObserveEntry::Transition(name.to_string())
    }
}

impl From<(&str, &str)> for ObserveEntry {
    fn from((transition, destination): (&str, &str)) -> Self {
        ObserveEntry::ToDecision(transition.to_string(), destination.to_string())
    }
}

impl From<(&str, &str, &str)> for ObserveEntry {
    fn from((transition, destination, reciprocal): (&str, &str, &str)) -> Self {
        ObserveEntry::WithReciprocal(
            transition.to_string(),
            destination.to_string(),
            reciprocal.to_string(),
        )
    }
}

/// Which hierarchy level a re-zoning targets: a literal level, or the
/// level of an existing zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReZoneTarget {
    Level(u32),
    OfZone(Zone),
}

fn empty_graph() -> &'static DecisionGraph {
    static EMPTY: OnceLock<DecisionGraph> = OnceLock::new();
    EMPTY.get_or_init(DecisionGraph::new)
}

fn empty_state() -> &'static GameState {
    static EMPTY: OnceLock<GameState> = OnceLock::new();
    EMPTY.get_or_init(GameState::new)
}

/// An exploration over time: an append-only list of [`Step`]s, each
/// holding its own copy of the decision graph and game state. Earlier
/// steps are never modified by later operations, so the history can be
/// replayed or inspected at any point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exploration {
    steps: Vec<Step>,
}

impl Exploration {
    /// A fresh exploration with no steps. Use [`start`] to place the
    /// first decision.
    ///
    /// [`start`]: Exploration::start
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a one-step exploration from an existing graph (copied) and
    /// an optional starting state. The step has no position; use
    /// [`warp`] or [`set_current_position`] to place the explorer.
    ///
    /// [`warp`]: Exploration::warp
    /// [`set_current_position`]: Exploration::set_current_position
    pub fn from_graph(graph: &DecisionGraph, state: Option<GameState>) -> Self {
        Self {
            steps: vec![Step::new(
                graph.clone(),
                None,
                state.unwrap_or_default(),
                None,
            )],
        }
    }

    // --- Step access ---

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there are no steps yet.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All steps, oldest first.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The step at an index.
    pub fn step(&self, n: usize) -> Result<&Step, ExploreError> {
        self.steps.get(n).ok_or(ExploreError::MissingStep(n))
    }

    /// The step at an index, or `None` when out of range.
    pub fn get_step(&self, n: usize) -> Option<&Step> {
        self.steps.get(n)
    }

    /// The graph at a step.
    pub fn graph_at_step(&self, n: usize) -> Result<&DecisionGraph, ExploreError> {
        Ok(&self.step(n)?.graph)
    }

    /// The graph at a step, or `None` when out of range.
    pub fn get_graph_at_step(&self, n: usize) -> Option<&DecisionGraph> {
        self.get_step(n).map(|s| &s.graph)
    }

    /// The position at a step; an error when the step has none.
    pub fn position_at_step(&self, n: usize) -> Result<&Decision, ExploreError> {
        self.step(n)?
            .position
            .as_ref()
            .ok_or(ExploreError::NoPosition(n))
    }

    /// The position at a step, or `None`.
    pub fn get_position_at_step(&self, n: usize) -> Option<&Decision> {
        self.get_step(n)?.position.as_ref()
    }

    /// The game state at a step.
    pub fn state_at_step(&self, n: usize) -> Result<&GameState, ExploreError> {
        Ok(&self.step(n)?.state)
    }

    /// The game state at a step, or `None`.
    pub fn get_state_at_step(&self, n: usize) -> Option<&GameState> {
        self.get_step(n).map(|s| &s.state)
    }

    /// The label of the transition taken to arrive at a step
    /// ([`START_TRANSITION`] for the first).
    pub fn transition_at_step(&self, n: usize) -> Result<Option<&Transition>, ExploreError> {
        Ok(self.step(n)?.transition.as_ref())
    }

    /// The transition taken *from* a step toward the next one, or
    /// `None` for the last step, which hasn't been left yet.
    pub fn transition_taken_at(&self, n: usize) -> Option<&Transition> {
        self.get_step(n + 1)?.transition.as_ref()
    }

    /// The tags on a step.
    pub fn tags_at_step(&self, n: usize) -> Result<&std::collections::BTreeSet<Tag>, ExploreError> {
        Ok(&self.step(n)?.tags)
    }

    /// The annotations on a step.
    pub fn annotations_at_step(&self, n: usize) -> Result<&[Annotation], ExploreError> {
        Ok(&self.step(n)?.annotations)
    }

    /// Tag the current step, or a specific step when `n` is given.
    pub fn tag_step(&mut self, tag: impl Into<Tag>, n: Option<usize>) -> Result<(), ExploreError> {
        let index = match n {
            Some(n) => n,
            None => self.steps.len().checked_sub(1).ok_or(ExploreError::NoSteps)?,
        };
        self.steps
            .get_mut(index)
            .ok_or(ExploreError::MissingStep(index))?
            .tags
            .insert(tag.into());
        Ok(())
    }

    /// Annotate the current step, or a specific step when `n` is given.
    pub fn annotate_step(
        &mut self,
        annotation: impl Into<Annotation>,
        n: Option<usize>,
    ) -> Result<(), ExploreError> {
        let index = match n {
            Some(n) => n,
            None => self.steps.len().checked_sub(1).ok_or(ExploreError::NoSteps)?,
        };
        self.steps
            .get_mut(index)
            .ok_or(ExploreError::MissingStep(index))?
            .annotations
            .push(annotation.into());
        Ok(())
    }

    // --- Current-step access ---

    /// The latest graph (an empty graph before any steps exist).
    pub fn current_graph(&self) -> &DecisionGraph {
        self.steps.last().map(|s| &s.graph).unwrap_or_else(|| empty_graph())
    }

    /// The latest game state (empty before any steps exist).
    pub fn current_state(&self) -> &GameState {
        self.steps.last().map(|s| &s.state).unwrap_or_else(|| empty_state())
    }

    /// The latest step, mutably.
    fn current_step_mut(&mut self) -> Result<&mut Step, ExploreError> {
        self.steps.last_mut().ok_or(ExploreError::NoSteps)
    }

    /// The latest game state, mutably.
    pub fn current_state_mut(&mut self) -> Result<&mut GameState, ExploreError> {
        Ok(&mut self.current_step_mut()?.state)
    }

    /// The latest graph, mutably. Prefer [`observe`] and [`re_zone`] for
    /// in-step graph augmentation.
    ///
    /// [`observe`]: Exploration::observe
    /// [`re_zone`]: Exploration::re_zone
    pub fn current_graph_mut(&mut self) -> Result<&mut DecisionGraph, ExploreError> {
        Ok(&mut self.current_step_mut()?.graph)
    }

    /// The current position.
    pub fn current_position(&self) -> Result<&Decision, ExploreError> {
        let last = self.steps.len().checked_sub(1).ok_or(ExploreError::NoSteps)?;
        self.position_at_step(last)
    }

    /// The current position, or `None`.
    pub fn get_current_position(&self) -> Option<&Decision> {
        self.steps.last()?.position.as_ref()
    }

    /// Move the current position without taking a step. The decision
    /// must exist in the current graph (or be `None` to clear).
    pub fn set_current_position(
        &mut self,
        decision: Option<Decision>,
    ) -> Result<(), ExploreError> {
        if let Some(decision) = &decision {
            if !self.current_graph().contains(decision) {
                return Err(GraphError::MissingDecision(decision.clone()).into());
            }
        }
        self.current_step_mut()?.position = decision;
        Ok(())
    }

    // --- State conveniences ---

    /// Whether the given power is held right now (equivalences not
    /// consulted).
    pub fn has_power_now(&self, power: &str) -> bool {
        self.current_state().has_power(power)
    }

    /// Like [`has_power_now`] but also true when an equivalence in the
    /// current graph resolves.
    ///
    /// [`has_power_now`]: Exploration::has_power_now
    pub fn has_power_or_equivalent_now(&self, power: &str) -> bool {
        has_power_or_equivalent(power, self.current_state(), self.current_graph().equivalences())
    }

    /// Grant a power in the current state.
    pub fn gain_power_now(&mut self, power: impl Into<String>) -> Result<(), ExploreError> {
        self.current_state_mut()?.gain_power(power);
        Ok(())
    }

    /// Remove a power from the current state.
    pub fn lose_power_now(&mut self, power: &str) -> Result<(), ExploreError> {
        self.current_state_mut()?.lose_power(power);
        Ok(())
    }

    /// The current count for a token type, or `None` if never tracked.
    pub fn token_count_now(&self, token: &str) -> Option<i64> {
        self.current_state().token_count(token)
    }

    /// Adjust a token count in the current state.
    pub fn adjust_tokens_now(
        &mut self,
        token: impl Into<String>,
        amount: i64,
    ) -> Result<(), ExploreError> {
        self.current_state_mut()?.adjust_tokens(token, amount);
        Ok(())
    }

    /// Overwrite a token count in the current state.
    pub fn set_tokens_now(
        &mut self,
        token: impl Into<String>,
        amount: i64,
    ) -> Result<(), ExploreError> {
        self.current_state_mut()?.set_tokens(token, amount);
        Ok(())
    }

    /// Update a transition's requirement in the current graph (`None`
    /// clears it).
    pub fn update_requirement_now(
        &mut self,
        decision: &str,
        transition: &str,
        requirement: Option<Requirement>,
    ) -> Result<(), ExploreError> {
        self.current_graph_mut()?.set_transition_requirement(
            decision,
            transition,
            requirement.unwrap_or_default(),
        )?;
        Ok(())
    }

    /// Whether a transition's requirement was satisfied by the state at
    /// a given step.
    pub fn traversable_at_step(
        &self,
        n: usize,
        decision: &str,
        transition: &str,
    ) -> Result<bool, ExploreError> {
        let graph = self.graph_at_step(n)?;
        let requirement = graph.get_transition_requirement(decision, transition)?;
        Ok(requirement.satisfied(self.state_at_step(n)?, graph.equivalences()))
    }

    /// Whether a transition's requirement is satisfied right now.
    pub fn traversable_now(&self, decision: &str, transition: &str) -> Result<bool, ExploreError> {
        let last = self.steps.len().checked_sub(1).ok_or(ExploreError::NoSteps)?;
        self.traversable_at_step(last, decision, transition)
    }

    // --- Effects ---

    /// Apply a list of effects to the current state and graph, without
    /// taking a step. Application is phased: all gains, then all losses,
    /// toggles, deactivates, and finally edits; within a phase, list
    /// order holds. Returns the effects with their counters and
    /// rotations advanced.
    pub fn apply_effects_now(
        &mut self,
        effects: Vec<TransitionEffect>,
        at: (&str, Option<&str>),
    ) -> Result<Vec<TransitionEffect>, ExploreError> {
        let mut effects = effects;
        self.apply_effects_phased(&mut effects, at)?;
        Ok(effects)
    }

    fn apply_effects_phased(
        &mut self,
        effects: &mut [TransitionEffect],
        at: (&str, Option<&str>),
    ) -> Result<(), ExploreError> {
        let phase = |effect: &TransitionEffect| match effect.kind {
            EffectKind::Gain(_) => 0,
            EffectKind::Lose(_) => 1,
            EffectKind::Toggle(_) => 2,
            EffectKind::Deactivate => 3,
            EffectKind::Edit(_) => 4,
        };
        let mut order: Vec<usize> = (0..effects.len()).collect();
        order.sort_by_key(|&i| phase(&effects[i]));
        for index in order {
            let mut effect = effects[index].clone();
            self.apply_effect_now(&mut effect, at)?;
            effects[index] = effect;
        }
        Ok(())
    }

    /// Apply a single effect, advancing its delay/charge counters and
    /// any internal rotation as a side effect.
    pub fn apply_effect_now(
        &mut self,
        effect: &mut TransitionEffect,
        at: (&str, Option<&str>),
    ) -> Result<(), ExploreError> {
        // A pending delay counts down instead of firing
        if let Some(delay) = effect.delay {
            if delay > 0 {
                effect.delay = Some(delay - 1);
                return Ok(());
            }
        }
        // Charges run out; the effect stays but stops firing
        if let Some(charges) = effect.charges {
            if charges == 0 {
                return Ok(());
            }
            effect.charges = Some(charges - 1);
        }

        match &mut effect.kind {
            EffectKind::Gain(Boon::Power(power)) => {
                let power = power.clone();
                self.gain_power_now(power)?;
            }
            EffectKind::Gain(Boon::Tokens(token, amount)) => {
                let (token, amount) = (token.clone(), *amount);
                self.adjust_tokens_now(token, amount)?;
            }
            EffectKind::Lose(Boon::Power(power)) => {
                let power = power.clone();
                self.lose_power_now(&power)?;
            }
            EffectKind::Lose(Boon::Tokens(token, amount)) => {
                let (token, amount) = (token.clone(), *amount);
                self.adjust_tokens_now(token, -amount)?;
            }
            EffectKind::Toggle(powers) => {
                if powers.is_empty() {
                    return Err(ExploreError::EmptyToggle);
                }
                if powers.len() == 1 {
                    let power = powers[0].clone();
                    if self.has_power_now(&power) {
                        self.lose_power_now(&power)?;
                    } else {
                        self.gain_power_now(power)?;
                    }
                } else {
                    let all = powers.clone();
                    for power in &all {
                        self.lose_power_now(power)?;
                    }
                    self.gain_power_now(all[0].clone())?;
                    powers.rotate_left(1);
                }
            }
            EffectKind::Deactivate => {
                let (decision, Some(transition)) = at else {
                    return Err(ExploreError::DeactivateOutsideTransition);
                };
                self.current_graph_mut()?.set_transition_requirement(
                    decision,
                    transition,
                    Requirement::Impossible,
                )?;
            }
            EffectKind::Edit(blocks) => {
                if !blocks.is_empty() {
                    let block = blocks[0].clone();
                    let mut scope = Scope::new();
                    self.seed_edit_scope(&mut scope, at);
                    self.run_command_block(&block, &mut scope)?;
                    blocks.rotate_left(1);
                }
            }
        }
        Ok(())
    }

    /// Bind the implicit edit-scope variables: `@` is the origin
    /// decision, `@t` the transition, `@d` its destination, and `@r` its
    /// reciprocal (the latter three may be `None`).
    fn seed_edit_scope(&self, scope: &mut Scope, at: (&str, Option<&str>)) {
        let (here, outwards) = at;
        scope.set("@", Value::Str(here.to_string()));
        match outwards {
            Some(transition) => {
                scope.set("@t", Value::Str(transition.to_string()));
                let graph = self.current_graph();
                scope.set(
                    "@d",
                    graph
                        .get_destination(here, transition)
                        .map(Value::Str)
                        .unwrap_or(Value::None),
                );
                scope.set(
                    "@r",
                    graph
                        .get_reciprocal(here, transition)
                        .map(Value::Str)
                        .unwrap_or(Value::None),
                );
            }
            None => {
                scope.set("@t", Value::None);
                scope.set("@d", Value::None);
                scope.set("@r", Value::None);
            }
        }
    }

    /// Apply a transition's effects (read from the current graph) to the
    /// current state and graph, writing advanced counters and rotations
    /// back onto the transition if it still exists afterwards.
    pub fn apply_transition_effects_now(
        &mut self,
        decision: &str,
        transition: &str,
    ) -> Result<(), ExploreError> {
        let mut effects = self
            .current_graph()
            .get_transition_effects(decision, transition)?
            .to_vec();
        self.apply_effects_phased(&mut effects, (decision, Some(transition)))?;
        // An edit block may have removed the transition out from under us
        if self.current_graph().get_destination(decision, transition).is_some() {
            self.current_graph_mut()?
                .set_transition_effects(decision, transition, effects)?;
        }
        Ok(())
    }

    /// Run a command block against this exploration, its current graph,
    /// and the given scope.
    pub fn run_command_block(
        &mut self,
        commands: &[Command],
        scope: &mut Scope,
    ) -> Result<(), ExploreError> {
        run_command_block(self, commands, scope)?;
        Ok(())
    }

    // --- Step-producing operations ---

    fn blocked_warning(&self, decision: &str, transition: &str) -> TransitionBlocked {
        let requirement = self
            .current_graph()
            .get_transition_requirement(decision, transition)
            .map(|r| r.clone())
            .unwrap_or_default();
        TransitionBlocked {
            step: self.len(),
            decision: decision.to_string(),
            transition: transition.to_string(),
            requirement,
        }
    }

    /// Place the first decision. Only legal while the exploration has no
    /// steps. The given connections are observed from the new decision,
    /// and the decision joins `zone` (created at level 0) if one is
    /// given.
    pub fn start(
        &mut self,
        decision: &str,
        connections: &[ObserveEntry],
        start_state: Option<GameState>,
        zone: Option<&str>,
    ) -> Result<(), ExploreError> {
        if !self.steps.is_empty() {
            return Err(ExploreError::AlreadyStarted);
        }

        let mut graph = DecisionGraph::new();
        graph.add_decision(decision)?;
        if let Some(zone) = zone {
            if graph.get_zone_info(zone).is_none() {
                graph.create_zone(zone, 0)?;
            }
            graph.add_decision_to_zone(decision, zone)?;
        }

        self.steps.push(Step::new(
            graph,
            Some(decision.to_string()),
            start_state.unwrap_or_default(),
            Some(START_TRANSITION.to_string()),
        ));

        self.observe(connections, None)?;
        Ok(())
    }

    /// Traverse a transition into unknown territory, resolving its
    /// destination as a brand-new decision.
    ///
    /// A transition not yet present at the current position is observed
    /// implicitly (on the new step's graph, so earlier steps are
    /// untouched). The transition must not lead to an already-known
    /// decision under a different name — use [`return_to`] for that. An
    /// unmet requirement produces a warning, not an error. After the new
    /// step is appended, the transition's effects apply to the new state
    /// and the given connections are observed at the new position.
    ///
    /// [`return_to`]: Exploration::return_to
    pub fn explore(
        &mut self,
        transition: &str,
        destination: &str,
        connections: &[ObserveEntry],
        reciprocal: Option<&str>,
        zone: ZonePlacement,
    ) -> Result<Vec<TransitionBlocked>, ExploreError> {
        let here = self.current_position()?.clone();
        let mut warnings = Vec::new();

        if self.current_graph().get_destination(&here, transition).is_some()
            && !self.traversable_now(&here, transition)?
        {
            warnings.push(self.blocked_warning(&here, transition));
        }

        let mut graph = self.current_graph().clone();
        let state = self.current_state().clone();

        if graph.get_destination(&here, transition).is_none() {
            graph.add_unexplored_edge_with(
                &here,
                transition,
                None,
                None,
                Default::default(),
                Default::default(),
            )?;
        }

        let current_destination = graph.get_destination(&here, transition);
        if graph.contains(destination)
            && current_destination.as_deref() != Some(destination)
            && !graph.is_unknown(destination)?
        {
            return Err(GraphError::UnknownDestination(format!(
                "cannot explore to decision '{destination}': it already exists (use return_to \
                 when revisiting a previous decision)"
            ))
            .into());
        }

        graph.replace_unexplored_with(
            &here,
            transition,
            Some(destination),
            reciprocal,
            ReplaceOptions {
                place_in_zone: zone,
                ..ReplaceOptions::default()
            },
        )?;

        self.steps.push(Step::new(
            graph,
            Some(destination.to_string()),
            state,
            Some(transition.to_string()),
        ));

        self.apply_transition_effects_now(&here, transition)?;
        self.observe(connections, None)?;
        Ok(warnings)
    }

    /// Traverse a transition into unknown territory that turns out to
    /// connect back to a decision already known. The destination must
    /// exist; an unmet requirement warns rather than errors.
    pub fn return_to(
        &mut self,
        transition: &str,
        destination: &str,
        reciprocal: Option<&str>,
    ) -> Result<Vec<TransitionBlocked>, ExploreError> {
        let here = self.current_position()?.clone();
        let mut warnings = Vec::new();

        if !self.traversable_now(&here, transition)? {
            warnings.push(self.blocked_warning(&here, transition));
        }

        let mut graph = self.current_graph().clone();
        let state = self.current_state().clone();

        if !graph.contains(destination) {
            return Err(GraphError::MissingDecision(destination.to_string()).into());
        }

        graph.replace_unexplored(&here, transition, Some(destination), reciprocal)?;

        self.steps.push(Step::new(
            graph,
            Some(destination.to_string()),
            state,
            Some(transition.to_string()),
        ));

        self.apply_transition_effects_now(&here, transition)?;
        Ok(warnings)
    }

    /// Re-traverse a transition whose destination is already known.
    pub fn retrace(&mut self, transition: &str) -> Result<Vec<TransitionBlocked>, ExploreError> {
        let here = self.current_position()?.clone();
        let graph = self.current_graph();

        let destination =
            graph
                .get_destination(&here, transition)
                .ok_or_else(|| GraphError::MissingTransition {
                    decision: here.clone(),
                    transition: transition.to_string(),
                })?;
        if graph.is_unknown(&destination)? {
            return Err(GraphError::UnknownDestination(format!(
                "cannot retrace transition '{transition}' from '{here}': it leads to an \
                 unexplored decision (use explore instead)"
            ))
            .into());
        }

        let mut warnings = Vec::new();
        if !self.traversable_now(&here, transition)? {
            warnings.push(self.blocked_warning(&here, transition));
        }

        let graph = self.current_graph().clone();
        let state = self.current_state().clone();
        self.steps.push(Step::new(
            graph,
            Some(destination),
            state,
            Some(transition.to_string()),
        ));

        self.apply_transition_effects_now(&here, transition)?;
        Ok(warnings)
    }

    /// Take an action (a self-transition) at the current decision,
    /// creating it if it doesn't exist and otherwise overwriting its
    /// requirement and effects with those given.
    pub fn take_action(
        &mut self,
        action: &str,
        requirement: Option<Requirement>,
        effects: Option<Vec<TransitionEffect>>,
    ) -> Result<Vec<TransitionBlocked>, ExploreError> {
        let here = self.current_position()?.clone();
        let mut graph = self.current_graph().clone();
        let state = self.current_state().clone();

        if graph.get_destination(&here, action).is_none() {
            graph.add_action(&here, action, requirement, effects)?;
        } else {
            graph.set_transition_requirement(&here, action, requirement.unwrap_or_default())?;
            if let Some(effects) = effects {
                graph.set_transition_effects(&here, action, effects)?;
            }
        }

        let mut warnings = Vec::new();
        let required = graph.get_transition_requirement(&here, action)?.clone();
        if !required.satisfied(self.current_state(), graph.equivalences()) {
            warnings.push(TransitionBlocked {
                step: self.len(),
                decision: here.clone(),
                transition: action.to_string(),
                requirement: required,
            });
        }

        self.steps.push(Step::new(
            graph,
            Some(here.clone()),
            state,
            Some(action.to_string()),
        ));

        self.apply_transition_effects_now(&here, action)?;
        Ok(warnings)
    }

    /// Move to a decision without creating a traversable edge. The
    /// history records a `~~` label (`..` when warping in place),
    /// suffixed with `:<message>` when one is given; that label must not
    /// collide with a real transition at the origin. The destination is
    /// created if missing and loses any unknown status. `deactivate`
    /// effects are not allowed here (there is no transition context).
    pub fn warp(
        &mut self,
        destination: &str,
        message: &str,
        effects: Option<Vec<TransitionEffect>>,
        zone: ZonePlacement,
    ) -> Result<(), ExploreError> {
        let here = self.current_position()?.clone();
        let mut graph = self.current_graph().clone();
        let state = self.current_state().clone();

        let new = !graph.contains(destination);
        if new {
            graph.add_decision(destination)?;
        }

        let prefix = if here == destination { ".." } else { "~~" };
        let label = if message.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}:{message}")
        };

        if graph.get_destination(&here, &label).is_some() {
            return Err(GraphError::TransitionCollision {
                decision: here.clone(),
                transition: label,
            }
            .into());
        }

        graph.set_unknown(destination, false)?;

        match zone {
            ZonePlacement::Unchanged => {}
            ZonePlacement::Inherit => {
                if new {
                    for parent in graph.zone_parents(&here)? {
                        graph.add_decision_to_zone(destination, &parent)?;
                    }
                }
            }
            ZonePlacement::Named(zone) => {
                if graph.get_zone_info(&zone).is_none() {
                    graph.create_zone(&zone, 0)?;
                    for parent in graph.zone_parents(&here)? {
                        for upper in graph.zone_parents(&parent)? {
                            graph.add_zone_to_zone(&zone, &upper)?;
                        }
                    }
                }
                graph.add_decision_to_zone(destination, &zone)?;
            }
        }

        self.steps.push(Step::new(
            graph,
            Some(destination.to_string()),
            state,
            Some(label),
        ));

        if let Some(effects) = effects {
            self.apply_effects_now(effects, (&here, None))?;
        }
        Ok(())
    }

    /// Wait in place: a warp to the current position.
    pub fn wait(
        &mut self,
        message: &str,
        effects: Option<Vec<TransitionEffect>>,
    ) -> Result<(), ExploreError> {
        let here = self.current_position()?.clone();
        self.warp(&here, message, effects, ZonePlacement::Inherit)
    }

    /// Observe new outgoing transitions at the current position (or at
    /// `at`, when given), augmenting the current step's graph in place —
    /// no new step is taken. Unknown destinations get placeholder
    /// decisions; named destinations that already exist are connected
    /// directly.
    pub fn observe(
        &mut self,
        entries: &[ObserveEntry],
        at: Option<&str>,
    ) -> Result<(), ExploreError> {
        let position = match at {
            Some(decision) => {
                if !self.current_graph().contains(decision) {
                    return Err(GraphError::MissingDecision(decision.to_string()).into());
                }
                decision.to_string()
            }
            None => self.current_position()?.clone(),
        };

        let graph = &mut self.current_step_mut()?.graph;
        for entry in entries {
            match entry {
                ObserveEntry::Transition(transition) => {
                    graph.add_unexplored_edge(&position, transition.clone())?;
                }
                ObserveEntry::ToDecision(transition, destination) => {
                    if graph.contains(destination) {
                        graph.add_transition(&position, transition.clone(), destination, None)?;
                    } else {
                        graph.add_unexplored_edge_with(
                            &position,
                            transition.clone(),
                            Some(destination.as_str()),
                            Some("return"),
                            Default::default(),
                            Default::default(),
                        )?;
                    }
                }
                ObserveEntry::WithReciprocal(transition, destination, reciprocal) => {
                    if graph.contains(destination) {
                        graph.add_transition(
                            &position,
                            transition.clone(),
                            destination,
                            Some(reciprocal.as_str()),
                        )?;
                    } else {
                        graph.add_unexplored_edge_with(
                            &position,
                            transition.clone(),
                            Some(destination.as_str()),
                            Some(reciprocal.as_str()),
                            Default::default(),
                            Default::default(),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Replace zones around the current position (or `at`) in the
    /// current step's graph, without taking a step. The level comes
    /// either literally or from an existing zone.
    pub fn re_zone(
        &mut self,
        zone: &str,
        replace: ReZoneTarget,
        at: Option<&str>,
    ) -> Result<(), ExploreError> {
        let position = match at {
            Some(decision) => decision.to_string(),
            None => self.current_position()?.clone(),
        };
        let level = match replace {
            ReZoneTarget::Level(level) => level,
            ReZoneTarget::OfZone(of) => self.current_graph().zone_hierarchy_level(&of)?,
        };
        self.current_step_mut()?
            .graph
            .replace_zones_in_hierarchy(&position, zone, level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::parse_command_list;

    fn started() -> Exploration {
        let mut ex = Exploration::new();
        ex.start("S", &[], None, None).unwrap();
        ex
    }

    #[test]
    fn start_establishes_first_step() {
        let mut ex = Exploration::new();
        ex.start("S", &["door".into()], None, Some("Field")).unwrap();

        assert_eq!(ex.len(), 1);
        assert_eq!(ex.current_position().unwrap(), "S");
        assert_eq!(
            ex.transition_at_step(0).unwrap().map(String::as_str),
            Some(START_TRANSITION)
        );
        // The observed connection points at an auto-named placeholder
        let graph = ex.current_graph();
        assert_eq!(graph.destination("S", "door").unwrap(), "_u.0");
        assert!(graph.is_unknown("_u.0").unwrap());
        assert!(graph.get_zone_info("Field").is_some());

        assert!(matches!(
            ex.start("T", &[], None, None),
            Err(ExploreError::AlreadyStarted)
        ));
    }

    #[test]
    fn explore_adds_a_step_without_touching_old_ones() {
        let mut ex = started();
        ex.explore("door", "T", &[], Some("back"), ZonePlacement::Inherit)
            .unwrap();

        assert_eq!(ex.len(), 2);
        assert_eq!(ex.position_at_step(1).unwrap(), "T");
        assert_eq!(ex.graph_at_step(1).unwrap().destination("S", "door").unwrap(), "T");
        assert_eq!(
            ex.graph_at_step(1).unwrap().destination("T", "back").unwrap(),
            "S"
        );
        assert_eq!(
            ex.graph_at_step(1).unwrap().get_reciprocal("S", "door"),
            Some("back".to_string())
        );
        // Step 0 predates the door entirely
        assert_eq!(ex.graph_at_step(0).unwrap().get_destination("S", "door"), None);
    }

    #[test]
    fn explore_resolves_observed_placeholder() {
        let mut ex = Exploration::new();
        ex.start("S", &["up".into()], None, None).unwrap();
        assert_eq!(ex.current_graph().destination("S", "up").unwrap(), "_u.0");

        ex.explore("up", "Attic", &["hatch".into()], Some("down"), ZonePlacement::Inherit)
            .unwrap();
        let graph = ex.current_graph();
        assert_eq!(graph.destination("S", "up").unwrap(), "Attic");
        assert!(!graph.contains("_u.0"));
        assert_eq!(graph.destination("Attic", "hatch").unwrap(), "_u.1");
    }

    #[test]
    fn explore_to_known_decision_is_rejected() {
        let mut ex = Exploration::new();
        ex.start("S", &["door".into(), "hole".into()], None, None)
            .unwrap();
        ex.explore("door", "T", &[], Some("back"), ZonePlacement::Inherit)
            .unwrap();
        ex.retrace("back").unwrap();
        let result = ex.explore("hole", "T", &[], None, ZonePlacement::Inherit);
        assert!(matches!(
            result,
            Err(ExploreError::Graph(GraphError::UnknownDestination(_)))
        ));
    }

    #[test]
    fn append_only_history() {
        let mut ex = started();
        ex.explore("door", "T", &[], Some("back"), ZonePlacement::Inherit)
            .unwrap();
        let snapshot0 = ex.step(0).unwrap().clone();

        // In-place edits touch only the current step...
        ex.gain_power_now("dash").unwrap();
        ex.observe(&["ledge".into()], None).unwrap();
        let snapshot1 = ex.step(1).unwrap().clone();

        // ...and step-producing operations never reach back
        ex.retrace("back").unwrap();
        ex.take_action("rest", None, None).unwrap();
        ex.warp("T", "", None, ZonePlacement::Unchanged).unwrap();

        assert_eq!(ex.step(0).unwrap(), &snapshot0);
        assert_eq!(ex.step(1).unwrap(), &snapshot1);
    }

    #[test]
    fn return_to_connects_known_territory() {
        let mut ex = Exploration::new();
        ex.start("S", &["door".into()], None, None).unwrap();
        ex.explore("door", "T", &["tunnel".into()], Some("back"), ZonePlacement::Inherit)
            .unwrap();
        ex.return_to("tunnel", "S", Some("tunnel-end")).unwrap();

        assert_eq!(ex.current_position().unwrap(), "S");
        let graph = ex.current_graph();
        assert_eq!(graph.destination("T", "tunnel").unwrap(), "S");
        assert_eq!(graph.destination("S", "tunnel-end").unwrap(), "T");
        assert_eq!(graph.get_reciprocal("T", "tunnel"), Some("tunnel-end".into()));

        // An unknown destination can't be "returned to"
        let mut ex2 = Exploration::new();
        ex2.start("S", &["door".into()], None, None).unwrap();
        assert!(matches!(
            ex2.return_to("door", "Nowhere", None),
            Err(ExploreError::Graph(GraphError::MissingDecision(_)))
        ));
    }

    #[test]
    fn retrace_needs_known_destination() {
        let mut ex = Exploration::new();
        ex.start("S", &["door".into()], None, None).unwrap();
        assert!(matches!(
            ex.retrace("door"),
            Err(ExploreError::Graph(GraphError::UnknownDestination(_)))
        ));
        assert!(matches!(
            ex.retrace("missing"),
            Err(ExploreError::Graph(GraphError::MissingTransition { .. }))
        ));

        ex.explore("door", "T", &[], Some("back"), ZonePlacement::Inherit)
            .unwrap();
        ex.retrace("back").unwrap();
        assert_eq!(ex.current_position().unwrap(), "S");
        assert_eq!(ex.len(), 3);
    }

    #[test]
    fn blocked_traversal_warns_but_proceeds() {
        let mut ex = Exploration::new();
        ex.start("S", &["door".into()], None, None).unwrap();
        ex.explore("door", "T", &[], Some("back"), ZonePlacement::Inherit)
            .unwrap();
        ex.current_graph_mut()
            .unwrap()
            .set_transition_requirement("T", "back", Requirement::parse("key*1").unwrap())
            .unwrap();

        let warnings = ex.retrace("back").unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].transition, "back");
        // The step was still taken
        assert_eq!(ex.current_position().unwrap(), "S");
    }

    #[test]
    fn take_action_applies_effects_in_place() {
        let mut ex = started();
        let effects = vec![
            TransitionEffect::gain(Boon::power("dash")),
            TransitionEffect::gain(Boon::tokens("coin", 2)),
        ];
        ex.take_action("loot", None, Some(effects)).unwrap();

        assert_eq!(ex.current_position().unwrap(), "S");
        assert!(ex.has_power_now("dash"));
        assert_eq!(ex.token_count_now("coin"), Some(2));
        assert_eq!(ex.len(), 2);
        // The action exists as a self-edge in the new step's graph
        assert_eq!(ex.current_graph().destination("S", "loot").unwrap(), "S");
        // But not in the starting step's graph
        assert_eq!(ex.graph_at_step(0).unwrap().get_destination("S", "loot"), None);
    }

    #[test]
    fn effect_phases_lose_after_gain() {
        let mut ex = started();
        // Listed with the loss first; gains still apply before losses
        let effects = vec![
            TransitionEffect::lose(Boon::tokens("coin", 1)),
            TransitionEffect::gain(Boon::tokens("coin", 5)),
        ];
        ex.take_action("trade", None, Some(effects)).unwrap();
        assert_eq!(ex.token_count_now("coin"), Some(4));
    }

    #[test]
    fn charges_and_delay_count_down() {
        let mut ex = started();
        let effects = vec![
            TransitionEffect::gain(Boon::tokens("slow", 1)).with_delay(1),
            TransitionEffect::gain(Boon::tokens("limited", 1)).with_charges(1),
        ];
        ex.take_action("pull", None, Some(effects)).unwrap();
        // Delay swallowed the first firing; the charge fired once
        assert_eq!(ex.token_count_now("slow"), None);
        assert_eq!(ex.token_count_now("limited"), Some(1));

        // Repeat without overwriting the stored (already counted-down)
        // effects
        ex.retrace("pull").unwrap();
        assert_eq!(ex.token_count_now("slow"), Some(1));
        assert_eq!(ex.token_count_now("limited"), Some(1));
    }

    #[test]
    fn toggle_rotation_cycles() {
        let mut ex = started();
        let effects = vec![TransitionEffect::toggle(vec![
            "red".to_string(),
            "blue".to_string(),
        ])];
        ex.take_action("switch", None, Some(effects)).unwrap();
        assert!(ex.has_power_now("red"));
        assert!(!ex.has_power_now("blue"));

        ex.retrace("switch").unwrap();
        assert!(ex.has_power_now("blue"));
        assert!(!ex.has_power_now("red"));

        ex.retrace("switch").unwrap();
        assert!(ex.has_power_now("red"));
        assert!(!ex.has_power_now("blue"));
    }

    #[test]
    fn single_toggle_flips() {
        let mut ex = started();
        let effects = vec![TransitionEffect::toggle(vec!["lamp".to_string()])];
        ex.take_action("flip", None, Some(effects)).unwrap();
        assert!(ex.has_power_now("lamp"));
        ex.retrace("flip").unwrap();
        assert!(!ex.has_power_now("lamp"));
    }

    #[test]
    fn deactivate_closes_the_transition_behind() {
        let mut ex = Exploration::new();
        ex.start("S", &["door".into()], None, None).unwrap();
        ex.explore("door", "T", &[], Some("back"), ZonePlacement::Inherit)
            .unwrap();
        ex.current_graph_mut()
            .unwrap()
            .set_transition_effects("T", "back", vec![TransitionEffect::deactivate()])
            .unwrap();

        ex.retrace("back").unwrap();
        assert_eq!(
            ex.current_graph().get_transition_requirement("T", "back").unwrap(),
            &Requirement::Impossible
        );
        // The step where the door still worked is unchanged
        assert_eq!(
            ex.graph_at_step(1).unwrap().get_transition_requirement("T", "back").unwrap(),
            &Requirement::Nothing
        );
    }

    #[test]
    fn edit_effect_runs_blocks_round_robin() {
        let first = parse_command_list(
            "assign token_type 'coin'\nassign amount 5\ncall exploration adjust_tokens_now\n",
        )
        .unwrap();
        let second = parse_command_list(
            "assign token_type 'gem'\nassign amount 1\ncall exploration adjust_tokens_now\n",
        )
        .unwrap();

        let mut ex = started();
        let effects = vec![TransitionEffect::edit(vec![first, second])];
        ex.take_action("shrine", None, Some(effects)).unwrap();
        assert_eq!(ex.token_count_now("coin"), Some(5));
        assert_eq!(ex.token_count_now("gem"), None);

        ex.retrace("shrine").unwrap();
        assert_eq!(ex.token_count_now("coin"), Some(5));
        assert_eq!(ex.token_count_now("gem"), Some(1));

        ex.retrace("shrine").unwrap();
        assert_eq!(ex.token_count_now("coin"), Some(10));
    }

    #[test]
    fn edit_scope_sees_transition_context() {
        // The block reads the implicit bindings and tags the decision
        // named by '@d'
        let block = parse_command_list(
            "assign decision $@d\nassign tag 'visited'\ncall graph tag_decision\n",
        )
        .unwrap();

        let mut ex = Exploration::new();
        ex.start("S", &["door".into()], None, None).unwrap();
        ex.explore("door", "T", &[], Some("back"), ZonePlacement::Inherit)
            .unwrap();
        ex.current_graph_mut()
            .unwrap()
            .set_transition_effects("S", "door", vec![TransitionEffect::edit(vec![block])])
            .unwrap();

        ex.retrace("door").unwrap();
        assert!(ex
            .current_graph()
            .decision_tags("T")
            .unwrap()
            .contains("visited"));
    }

    #[test]
    fn warp_labels_and_collisions() {
        let mut ex = started();
        ex.warp("Elsewhere", "", None, ZonePlacement::Inherit).unwrap();
        assert_eq!(ex.current_position().unwrap(), "Elsewhere");
        assert_eq!(
            ex.transition_at_step(1).unwrap().map(String::as_str),
            Some("~~")
        );

        ex.warp("Elsewhere", "rested", None, ZonePlacement::Inherit)
            .unwrap();
        assert_eq!(
            ex.transition_at_step(2).unwrap().map(String::as_str),
            Some("..:rested")
        );

        // A real transition using the label blocks the warp
        let mut ex2 = started();
        ex2.current_graph_mut()
            .unwrap()
            .add_decision("T")
            .unwrap();
        ex2.current_graph_mut()
            .unwrap()
            .add_transition("S", "~~", "T", None)
            .unwrap();
        assert!(matches!(
            ex2.warp("T", "", None, ZonePlacement::Inherit),
            Err(ExploreError::Graph(GraphError::TransitionCollision { .. }))
        ));
    }

    #[test]
    fn warp_rejects_deactivate_effects() {
        let mut ex = started();
        let result = ex.warp(
            "Elsewhere",
            "",
            Some(vec![TransitionEffect::deactivate()]),
            ZonePlacement::Inherit,
        );
        assert!(matches!(
            result,
            Err(ExploreError::DeactivateOutsideTransition)
        ));
    }

    #[test]
    fn wait_stays_put() {
        let mut ex = started();
        ex.wait("", Some(vec![TransitionEffect::gain(Boon::tokens("tick", 1))]))
            .unwrap();
        assert_eq!(ex.current_position().unwrap(), "S");
        assert_eq!(
            ex.transition_at_step(1).unwrap().map(String::as_str),
            Some("..")
        );
        assert_eq!(ex.token_count_now("tick"), Some(1));
    }

    #[test]
    fn observe_variants() {
        let mut ex = started();
        ex.current_graph_mut().unwrap().add_decision("Known").unwrap();
        ex.observe(
            &[
                "mystery".into(),
                ("pathway", "Clearing").into(),
                ("bridge", "Known", "bridge-back").into(),
            ],
            None,
        )
        .unwrap();

        let graph = ex.current_graph();
        assert_eq!(graph.destination("S", "mystery").unwrap(), "_u.0");
        assert_eq!(graph.destination("S", "pathway").unwrap(), "Clearing");
        assert!(graph.is_unknown("Clearing").unwrap());
        assert_eq!(graph.destination("S", "bridge").unwrap(), "Known");
        assert_eq!(graph.destination("Known", "bridge-back").unwrap(), "S");
        assert_eq!(graph.get_reciprocal("S", "bridge"), Some("bridge-back".into()));
        // No step was added
        assert_eq!(ex.len(), 1);

        assert!(matches!(
            ex.observe(&["x".into()], Some("Ghost")),
            Err(ExploreError::Graph(GraphError::MissingDecision(_)))
        ));
    }

    #[test]
    fn from_graph_seeds_one_step() {
        let mut graph = DecisionGraph::new();
        graph.add_decision("Room1").unwrap();
        graph.add_decision("Room2").unwrap();
        graph.add_transition("Room1", "door", "Room2", None).unwrap();

        let mut ex = Exploration::from_graph(&graph, None);
        assert_eq!(ex.len(), 1);
        assert_eq!(ex.get_current_position(), None);
        assert!(matches!(
            ex.start("X", &[], None, None),
            Err(ExploreError::AlreadyStarted)
        ));
        ex.set_current_position(Some("Room1".to_string())).unwrap();
        assert_eq!(ex.current_position().unwrap(), "Room1");
        // The source graph isn't aliased
        ex.current_graph_mut().unwrap().add_decision("Room3").unwrap();
        assert!(!graph.contains("Room3"));
    }

    #[test]
    fn re_zone_replaces_around_position() {
        let mut ex = Exploration::new();
        ex.start("S", &[], None, Some("Cave")).unwrap();
        ex.re_zone("Cavern", ReZoneTarget::Level(0), None).unwrap();
        let graph = ex.current_graph();
        assert!(graph.decisions_in_zone("Cavern").unwrap().contains("S"));
        assert!(graph.decisions_in_zone("Cave").unwrap().is_empty());
    }

    #[test]
    fn explore_zone_inheritance() {
        let mut ex = Exploration::new();
        ex.start("S", &["door".into()], None, Some("Field")).unwrap();
        ex.explore("door", "T", &[], Some("back"), ZonePlacement::Inherit)
            .unwrap();
        assert!(ex
            .current_graph()
            .decisions_in_zone("Field")
            .unwrap()
            .contains("T"));

        ex.observe(&["gate".into()], None).unwrap();
        ex.explore(
            "gate",
            "U",
            &[],
            None,
            ZonePlacement::Named("Garden".to_string()),
        )
        .unwrap();
        let graph = ex.current_graph();
        assert!(graph.decisions_in_zone("Garden").unwrap().contains("U"));
        assert!(!graph.decisions_in_zone("Field").unwrap().contains("U"));
    }

    #[test]
    fn step_tags_and_annotations() {
        let mut ex = started();
        ex.tag_step("milestone", None).unwrap();
        ex.annotate_step("first camp", Some(0)).unwrap();
        assert!(ex.tags_at_step(0).unwrap().contains("milestone"));
        assert_eq!(ex.annotations_at_step(0).unwrap(), ["first camp"]);
    }

    #[test]
    fn traversable_tracks_requirements() {
        let mut ex = Exploration::new();
        ex.start("S", &["door".into()], None, None).unwrap();
        ex.current_graph_mut()
            .unwrap()
            .set_transition_requirement("S", "door", Requirement::parse("key*1").unwrap())
            .unwrap();
        assert!(!ex.traversable_now("S", "door").unwrap());
        ex.adjust_tokens_now("key", 1).unwrap();
        assert!(ex.traversable_now("S", "door").unwrap());
    }

    #[test]
    fn equivalences_count_for_traversal() {
        let mut ex = Exploration::new();
        ex.start("S", &["door".into()], None, None).unwrap();
        {
            let graph = ex.current_graph_mut().unwrap();
            graph
                .set_transition_requirement("S", "door", Requirement::parse("fly").unwrap())
                .unwrap();
            graph.add_equivalence("fly", Requirement::parse("jump&cape").unwrap());
        }
        assert!(!ex.traversable_now("S", "door").unwrap());
        ex.gain_power_now("jump").unwrap();
        ex.gain_power_now("cape").unwrap();
        assert!(ex.traversable_now("S", "door").unwrap());
        assert!(!ex.has_power_now("fly"));
        assert!(ex.has_power_or_equivalent_now("fly"));
    }
}
