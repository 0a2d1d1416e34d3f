//! The decision-graph container and its surgery operations.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use wayfarer_core::effect::TransitionEffect;
use wayfarer_core::requirement::{Equivalences, Requirement};
use wayfarer_core::types::{Annotation, Decision, Power, Tag, Transition, Zone};

use crate::error::GraphError;
use crate::name::unique_name;
use crate::properties::{merge_properties, TransitionProperties};
use crate::zone::ZoneInfo;

/// The tag marking a placeholder decision whose territory has not been
/// visited yet.
pub const UNKNOWN_TAG: &str = "unknown";

/// The tag applied to ending transitions and decisions.
pub const ENDING_TAG: &str = "ending";

/// One outgoing edge of a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionData {
    /// Destination decision.
    pub to: Decision,
    /// Requirement for traversal; `Nothing` when unrestricted.
    pub requirement: Requirement,
    /// Effects applied when the transition is taken.
    pub effects: Vec<TransitionEffect>,
    /// Tags on this transition.
    pub tags: BTreeSet<Tag>,
    /// Annotations on this transition.
    pub annotations: Vec<Annotation>,
    /// Name of the transition at the destination considered the way
    /// back. A directional pointer, not automatically symmetric.
    pub reciprocal: Option<Transition>,
}

impl TransitionData {
    fn new(to: impl Into<Decision>) -> Self {
        Self {
            to: to.into(),
            requirement: Requirement::Nothing,
            effects: Vec::new(),
            tags: BTreeSet::new(),
            annotations: Vec::new(),
            reciprocal: None,
        }
    }

    fn properties(&self) -> TransitionProperties {
        TransitionProperties {
            requirement: self.requirement.clone(),
            effects: self.effects.clone(),
            tags: self.tags.clone(),
            annotations: self.annotations.clone(),
        }
    }

    fn apply_properties(&mut self, properties: &TransitionProperties) {
        self.requirement = properties.requirement.clone();
        self.effects = properties.effects.clone();
        self.tags = properties.tags.clone();
        self.annotations = properties.annotations.clone();
    }
}

/// A decision node: its tags, annotations, and outgoing transitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionNode {
    pub tags: BTreeSet<Tag>,
    pub annotations: Vec<Annotation>,
    pub outgoing: BTreeMap<Transition, TransitionData>,
}

/// Optional properties for a newly created edge.
#[derive(Debug, Clone, Default)]
pub struct EdgeOptions {
    pub tags: BTreeSet<Tag>,
    pub annotations: Vec<Annotation>,
    pub requirement: Option<Requirement>,
    pub effects: Option<Vec<TransitionEffect>>,
}

/// Where a newly resolved or warped-to decision should be placed in the
/// zone hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ZonePlacement {
    /// Make no zone changes.
    #[default]
    Unchanged,
    /// Copy the origin decision's direct zone memberships (only for
    /// destinations that still need zone info).
    Inherit,
    /// Place into this zone, creating it at level 0 if necessary.
    Named(Zone),
}

/// Optional arguments for [`DecisionGraph::replace_unexplored_with`].
#[derive(Debug, Clone, Default)]
pub struct ReplaceOptions {
    pub requirement: Option<Requirement>,
    pub effects: Option<Vec<TransitionEffect>>,
    pub tags: BTreeSet<Tag>,
    pub annotations: Vec<Annotation>,
    pub rev_requirement: Option<Requirement>,
    pub rev_effects: Option<Vec<TransitionEffect>>,
    pub rev_tags: BTreeSet<Tag>,
    pub rev_annotations: Vec<Annotation>,
    pub decision_tags: BTreeSet<Tag>,
    pub decision_annotations: Vec<Annotation>,
    pub place_in_zone: ZonePlacement,
}

/// Old-name to new-name mapping for transitions renamed during surgery.
pub type RenameMap = BTreeMap<Transition, Transition>;

/// The two rename maps produced by [`DecisionGraph::replace_unexplored`]:
/// renames among the resolved destination's outgoing transitions, and
/// renames among the source decision's outgoing transitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenameMaps {
    pub at_destination: RenameMap,
    pub at_source: RenameMap,
}

/// Properties recovered from a removed transition (and its reciprocal,
/// when cascade removal was requested).
#[derive(Debug, Clone)]
pub struct RemovedTransition {
    pub properties: TransitionProperties,
    pub reciprocal_properties: Option<TransitionProperties>,
}

/// A view of the world as a graph of decisions at one moment in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionGraph {
    pub(crate) decisions: BTreeMap<Decision, DecisionNode>,
    pub(crate) zones: BTreeMap<Zone, ZoneInfo>,
    pub(crate) zone_map: BTreeMap<Decision, BTreeSet<Zone>>,
    /// Number of unknown decisions ever created; never reused.
    pub(crate) unknown_count: u64,
    pub(crate) equivalences: Equivalences,
}

impl DecisionGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Lookup ---

    /// Whether a decision with this name exists.
    pub fn contains(&self, decision: &str) -> bool {
        self.decisions.contains_key(decision)
    }

    /// Number of decisions.
    pub fn decision_count(&self) -> usize {
        self.decisions.len()
    }

    /// Whether the graph has no decisions at all.
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Iterate over decision names.
    pub fn decisions(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.keys()
    }

    /// Total number of transitions.
    pub fn transition_count(&self) -> usize {
        self.decisions.values().map(|n| n.outgoing.len()).sum()
    }

    fn node(&self, decision: &str) -> Result<&DecisionNode, GraphError> {
        self.decisions
            .get(decision)
            .ok_or_else(|| GraphError::MissingDecision(decision.to_string()))
    }

    fn node_mut(&mut self, decision: &str) -> Result<&mut DecisionNode, GraphError> {
        self.decisions
            .get_mut(decision)
            .ok_or_else(|| GraphError::MissingDecision(decision.to_string()))
    }

    fn edge(&self, decision: &str, transition: &str) -> Result<&TransitionData, GraphError> {
        self.node(decision)?
            .outgoing
            .get(transition)
            .ok_or_else(|| GraphError::MissingTransition {
                decision: decision.to_string(),
                transition: transition.to_string(),
            })
    }

    fn edge_mut(
        &mut self,
        decision: &str,
        transition: &str,
    ) -> Result<&mut TransitionData, GraphError> {
        self.decisions
            .get_mut(decision)
            .ok_or_else(|| GraphError::MissingDecision(decision.to_string()))?
            .outgoing
            .get_mut(transition)
            .ok_or_else(|| GraphError::MissingTransition {
                decision: decision.to_string(),
                transition: transition.to_string(),
            })
    }

    /// The destination of a transition.
    pub fn destination(&self, decision: &str, transition: &str) -> Result<Decision, GraphError> {
        Ok(self.edge(decision, transition)?.to.clone())
    }

    /// The destination of a transition, or `None` if the decision or
    /// transition doesn't exist.
    pub fn get_destination(&self, decision: &str, transition: &str) -> Option<Decision> {
        Some(
            self.decisions
                .get(decision)?
                .outgoing
                .get(transition)?
                .to
                .clone(),
        )
    }

    /// A snapshot of all outgoing transitions and their destinations.
    pub fn destinations_from(
        &self,
        decision: &str,
    ) -> Result<BTreeMap<Transition, Decision>, GraphError> {
        Ok(self
            .node(decision)?
            .outgoing
            .iter()
            .map(|(name, data)| (name.clone(), data.to.clone()))
            .collect())
    }

    /// The set of self-edges (actions) at a decision.
    pub fn decision_actions(&self, decision: &str) -> Result<BTreeSet<Transition>, GraphError> {
        Ok(self
            .node(decision)?
            .outgoing
            .iter()
            .filter(|(_, data)| data.to == decision)
            .map(|(name, _)| name.clone())
            .collect())
    }

    /// Every edge anywhere in the graph that targets the given decision,
    /// as (source, transition) pairs. Linear in the number of edges.
    pub fn all_edges_to(&self, target: &str) -> Vec<(Decision, Transition)> {
        let mut result = Vec::new();
        for (source, node) in &self.decisions {
            for (name, data) in &node.outgoing {
                if data.to == target {
                    result.push((source.clone(), name.clone()));
                }
            }
        }
        result
    }

    // --- Transition properties ---

    /// A copy of a transition's property bundle (requirement, effects,
    /// tags, annotations — the reciprocal is not included).
    pub fn get_transition_properties(
        &self,
        decision: &str,
        transition: &str,
    ) -> Result<TransitionProperties, GraphError> {
        Ok(self.edge(decision, transition)?.properties())
    }

    /// Overwrite all four transition properties at once.
    pub fn set_transition_properties(
        &mut self,
        decision: &str,
        transition: &str,
        properties: &TransitionProperties,
    ) -> Result<(), GraphError> {
        self.edge_mut(decision, transition)?
            .apply_properties(properties);
        Ok(())
    }

    /// The requirement for a transition (`Nothing` when unrestricted).
    pub fn get_transition_requirement(
        &self,
        decision: &str,
        transition: &str,
    ) -> Result<&Requirement, GraphError> {
        Ok(&self.edge(decision, transition)?.requirement)
    }

    /// Replace the requirement for a transition.
    pub fn set_transition_requirement(
        &mut self,
        decision: &str,
        transition: &str,
        requirement: Requirement,
    ) -> Result<(), GraphError> {
        self.edge_mut(decision, transition)?.requirement = requirement;
        Ok(())
    }

    /// The effects of a transition.
    pub fn get_transition_effects(
        &self,
        decision: &str,
        transition: &str,
    ) -> Result<&[TransitionEffect], GraphError> {
        Ok(&self.edge(decision, transition)?.effects)
    }

    /// Replace the effects of a transition.
    pub fn set_transition_effects(
        &mut self,
        decision: &str,
        transition: &str,
        effects: Vec<TransitionEffect>,
    ) -> Result<(), GraphError> {
        self.edge_mut(decision, transition)?.effects = effects;
        Ok(())
    }

    /// Append one effect to a transition's effect list.
    pub fn add_transition_effect(
        &mut self,
        decision: &str,
        transition: &str,
        effect: TransitionEffect,
    ) -> Result<(), GraphError> {
        self.edge_mut(decision, transition)?.effects.push(effect);
        Ok(())
    }

    /// Tag a transition.
    pub fn tag_transition(
        &mut self,
        decision: &str,
        transition: &str,
        tag: impl Into<Tag>,
    ) -> Result<(), GraphError> {
        self.edge_mut(decision, transition)?.tags.insert(tag.into());
        Ok(())
    }

    /// Remove a tag from a transition; false if it wasn't present.
    pub fn untag_transition(
        &mut self,
        decision: &str,
        transition: &str,
        tag: &str,
    ) -> Result<bool, GraphError> {
        Ok(self.edge_mut(decision, transition)?.tags.remove(tag))
    }

    /// The tags on a transition.
    pub fn transition_tags(
        &self,
        decision: &str,
        transition: &str,
    ) -> Result<&BTreeSet<Tag>, GraphError> {
        Ok(&self.edge(decision, transition)?.tags)
    }

    /// Append an annotation to a transition.
    pub fn annotate_transition(
        &mut self,
        decision: &str,
        transition: &str,
        annotation: impl Into<Annotation>,
    ) -> Result<(), GraphError> {
        self.edge_mut(decision, transition)?
            .annotations
            .push(annotation.into());
        Ok(())
    }

    /// The annotations on a transition.
    pub fn transition_annotations(
        &self,
        decision: &str,
        transition: &str,
    ) -> Result<&[Annotation], GraphError> {
        Ok(&self.edge(decision, transition)?.annotations)
    }

    // --- Decision tags & annotations ---

    /// Tag a decision.
    pub fn tag_decision(&mut self, decision: &str, tag: impl Into<Tag>) -> Result<(), GraphError> {
        self.node_mut(decision)?.tags.insert(tag.into());
        Ok(())
    }

    /// Remove a tag from a decision; false if it wasn't present.
    pub fn untag_decision(&mut self, decision: &str, tag: &str) -> Result<bool, GraphError> {
        Ok(self.node_mut(decision)?.tags.remove(tag))
    }

    /// The tags on a decision.
    pub fn decision_tags(&self, decision: &str) -> Result<&BTreeSet<Tag>, GraphError> {
        Ok(&self.node(decision)?.tags)
    }

    /// Append an annotation to a decision.
    pub fn annotate_decision(
        &mut self,
        decision: &str,
        annotation: impl Into<Annotation>,
    ) -> Result<(), GraphError> {
        self.node_mut(decision)?.annotations.push(annotation.into());
        Ok(())
    }

    /// The annotations on a decision.
    pub fn decision_annotations(&self, decision: &str) -> Result<&[Annotation], GraphError> {
        Ok(&self.node(decision)?.annotations)
    }

    // --- Equivalences ---

    /// Register a requirement whose satisfaction counts as holding the
    /// given power. Holding a power via an equivalence does not count as
    /// actually holding it.
    pub fn add_equivalence(&mut self, power: impl Into<Power>, requirement: Requirement) {
        self.equivalences
            .entry(power.into())
            .or_default()
            .insert(requirement);
    }

    /// Remove an equivalence; false if it wasn't registered.
    pub fn remove_equivalence(&mut self, power: &str, requirement: &Requirement) -> bool {
        match self.equivalences.get_mut(power) {
            Some(set) => set.remove(requirement),
            None => false,
        }
    }

    /// The set of equivalences registered for a power.
    pub fn all_equivalents(&self, power: &str) -> BTreeSet<Requirement> {
        self.equivalences.get(power).cloned().unwrap_or_default()
    }

    /// The full power-equivalence map.
    pub fn equivalences(&self) -> &Equivalences {
        &self.equivalences
    }

    // --- Unknown status ---

    /// Whether a decision is an unvisited placeholder.
    pub fn is_unknown(&self, decision: &str) -> Result<bool, GraphError> {
        Ok(self.node(decision)?.tags.contains(UNKNOWN_TAG))
    }

    /// Set or clear a decision's unknown status.
    pub fn set_unknown(&mut self, decision: &str, unknown: bool) -> Result<(), GraphError> {
        let node = self.node_mut(decision)?;
        if unknown {
            node.tags.insert(UNKNOWN_TAG.to_string());
        } else {
            node.tags.remove(UNKNOWN_TAG);
        }
        Ok(())
    }

    // --- Reciprocals ---

    /// The reciprocal of a transition, or `None` if no reciprocal has
    /// been established (or the decision/transition doesn't exist).
    pub fn get_reciprocal(&self, decision: &str, transition: &str) -> Option<Transition> {
        self.decisions
            .get(decision)?
            .outgoing
            .get(transition)?
            .reciprocal
            .clone()
    }

    /// The destination and reciprocal name together, or `None` if
    /// either is unavailable.
    pub fn get_reciprocal_pair(
        &self,
        decision: &str,
        transition: &str,
    ) -> Option<(Decision, Transition)> {
        let reciprocal = self.get_reciprocal(decision, transition)?;
        let destination = self.get_destination(decision, transition)?;
        Some((destination, reciprocal))
    }

    /// Set (or, with `None`, clear) the reciprocal of a transition,
    /// keeping the relationship exclusive and symmetric: the reciprocal
    /// edge's own pointer is updated, and edges that previously held
    /// either pointer are severed.
    pub fn set_reciprocal(
        &mut self,
        decision: &str,
        transition: &str,
        reciprocal: Option<&str>,
    ) -> Result<(), GraphError> {
        self.set_reciprocal_with(decision, transition, reciprocal, true, true)
    }

    /// Full-control version of [`set_reciprocal`].
    ///
    /// With `set_both` false only the forward pointer changes (breaking
    /// exclusivity deliberately); with `cleanup` false abandoned
    /// reciprocal pointers are left in place.
    ///
    /// [`set_reciprocal`]: DecisionGraph::set_reciprocal
    pub fn set_reciprocal_with(
        &mut self,
        decision: &str,
        transition: &str,
        reciprocal: Option<&str>,
        set_both: bool,
        cleanup: bool,
    ) -> Result<(), GraphError> {
        let dest = self.destination(decision, transition)?;

        let Some(reciprocal) = reciprocal else {
            // Clearing: drop the pointer, and with set_both the old
            // reciprocal edge's pointer too.
            let old = self.edge_mut(decision, transition)?.reciprocal.take();
            if set_both {
                if let Some(old_name) = old {
                    if let Ok(rev_edge) = self.edge_mut(&dest, &old_name) {
                        rev_edge.reciprocal = None;
                    }
                }
            }
            return Ok(());
        };

        let rev_dest =
            self.get_destination(&dest, reciprocal)
                .ok_or_else(|| GraphError::MissingTransition {
                    decision: dest.clone(),
                    transition: reciprocal.to_string(),
                })?;
        if rev_dest != decision {
            return Err(GraphError::InvalidDestination(format!(
                "reciprocal transition '{reciprocal}' from decision '{dest}' leads to \
                 '{rev_dest}', not back to '{decision}'"
            )));
        }

        let abandoned = self
            .edge_mut(decision, transition)?
            .reciprocal
            .replace(reciprocal.to_string());
        if cleanup {
            if let Some(abandoned) = abandoned.filter(|a| a != reciprocal) {
                if let Ok(edge) = self.edge_mut(&dest, &abandoned) {
                    edge.reciprocal = None;
                }
            }
        }

        if set_both {
            let rev_abandoned = self
                .edge_mut(&dest, reciprocal)?
                .reciprocal
                .replace(transition.to_string());
            if cleanup {
                if let Some(rev_abandoned) = rev_abandoned.filter(|a| a != transition) {
                    if let Ok(edge) = self.edge_mut(decision, &rev_abandoned) {
                        edge.reciprocal = None;
                    }
                }
            }
        }

        Ok(())
    }

    // --- Construction ---

    /// Add a decision with no transitions yet.
    pub fn add_decision(&mut self, name: impl Into<Decision>) -> Result<(), GraphError> {
        self.add_decision_with(name, BTreeSet::new(), Vec::new())
    }

    /// Add a decision with initial tags and annotations.
    pub fn add_decision_with(
        &mut self,
        name: impl Into<Decision>,
        tags: BTreeSet<Tag>,
        annotations: Vec<Annotation>,
    ) -> Result<(), GraphError> {
        let name = name.into();
        if self.decisions.contains_key(&name) {
            return Err(GraphError::DecisionCollision(name));
        }
        self.decisions.insert(
            name,
            DecisionNode {
                tags,
                annotations,
                outgoing: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Add a transition between two existing decisions, optionally with
    /// a reciprocal edge in the reverse direction.
    pub fn add_transition(
        &mut self,
        from: &str,
        name: impl Into<Transition>,
        to: &str,
        rev_name: Option<&str>,
    ) -> Result<(), GraphError> {
        self.add_transition_with(
            from,
            name,
            to,
            rev_name,
            EdgeOptions::default(),
            EdgeOptions::default(),
        )
    }

    /// Add a transition with properties for the forward (and, when a
    /// reciprocal is requested, reverse) edge.
    pub fn add_transition_with(
        &mut self,
        from: &str,
        name: impl Into<Transition>,
        to: &str,
        rev_name: Option<&str>,
        forward: EdgeOptions,
        reverse: EdgeOptions,
    ) -> Result<(), GraphError> {
        let name = name.into();
        if !self.contains(from) {
            return Err(GraphError::MissingDecision(from.to_string()));
        }
        if !self.contains(to) {
            return Err(GraphError::MissingDecision(to.to_string()));
        }
        if self.get_destination(from, &name).is_some() {
            return Err(GraphError::TransitionCollision {
                decision: from.to_string(),
                transition: name,
            });
        }
        // Check the reverse edge before adding the forward one, so a
        // collision doesn't leave a half-added pair behind.
        if let Some(rev) = rev_name {
            if self.get_destination(to, rev).is_some() || (from == to && rev == name) {
                return Err(GraphError::TransitionCollision {
                    decision: to.to_string(),
                    transition: rev.to_string(),
                });
            }
        }

        let mut data = TransitionData::new(to);
        data.requirement = forward.requirement.unwrap_or_default();
        data.effects = forward.effects.unwrap_or_default();
        data.tags = forward.tags;
        data.annotations = forward.annotations;
        self.node_mut(from)?.outgoing.insert(name.clone(), data);

        if let Some(rev) = rev_name {
            let mut rev_data = TransitionData::new(from);
            rev_data.requirement = reverse.requirement.unwrap_or_default();
            rev_data.effects = reverse.effects.unwrap_or_default();
            rev_data.tags = reverse.tags;
            rev_data.annotations = reverse.annotations;
            self.node_mut(to)?.outgoing.insert(rev.to_string(), rev_data);
            self.set_reciprocal(from, &name, Some(rev))?;
        }

        Ok(())
    }

    /// Add a self-edge (action) at a decision.
    pub fn add_action(
        &mut self,
        decision: &str,
        action: impl Into<Transition>,
        requirement: Option<Requirement>,
        effects: Option<Vec<TransitionEffect>>,
    ) -> Result<(), GraphError> {
        self.add_transition_with(
            decision,
            action,
            decision,
            None,
            EdgeOptions {
                requirement,
                effects,
                ..EdgeOptions::default()
            },
            EdgeOptions::default(),
        )
    }

    /// Remove an edge without any reciprocal bookkeeping.
    fn remove_edge_by_key(&mut self, from: &str, transition: &str) -> Option<TransitionData> {
        self.decisions.get_mut(from)?.outgoing.remove(transition)
    }

    /// Clear the reciprocal pointer of every edge targeting `to` whose
    /// pointer names the removed transition.
    fn scrub_reciprocal_pointers(&mut self, to: &str, removed: &str) {
        for node in self.decisions.values_mut() {
            for data in node.outgoing.values_mut() {
                if data.to == to && data.reciprocal.as_deref() == Some(removed) {
                    data.reciprocal = None;
                }
            }
        }
    }

    /// Remove a transition, clearing any reciprocal pointers that named
    /// it. With `remove_reciprocal` the reciprocal edge is removed too
    /// (no error if there wasn't one). Returns the removed properties.
    pub fn remove_transition(
        &mut self,
        from: &str,
        transition: &str,
        remove_reciprocal: bool,
    ) -> Result<RemovedTransition, GraphError> {
        let destination = self.destination(from, transition)?;
        let reciprocal = self.get_reciprocal(from, transition);

        let properties = self.edge(from, transition)?.properties();
        self.remove_edge_by_key(from, transition);
        self.scrub_reciprocal_pointers(from, transition);

        let reciprocal_properties = if remove_reciprocal {
            match reciprocal {
                Some(recip) => {
                    let r_props = self.edge(&destination, &recip)?.properties();
                    self.remove_edge_by_key(&destination, &recip);
                    self.scrub_reciprocal_pointers(&destination, &recip);
                    Some(r_props)
                }
                None => None,
            }
        } else {
            None
        };

        Ok(RemovedTransition {
            properties,
            reciprocal_properties,
        })
    }

    /// Add a transition to a brand-new placeholder decision tagged
    /// `unknown`, with an automatic `_u.<n>` name and a `return`
    /// reciprocal. Returns the placeholder's name.
    pub fn add_unexplored_edge(
        &mut self,
        from: &str,
        name: impl Into<Transition>,
    ) -> Result<Decision, GraphError> {
        self.add_unexplored_edge_with(
            from,
            name,
            None,
            Some("return"),
            EdgeOptions::default(),
            EdgeOptions::default(),
        )
    }

    /// Full-control version of [`add_unexplored_edge`]: explicit
    /// destination name, reciprocal name (or `None` for no reciprocal),
    /// and edge properties.
    ///
    /// [`add_unexplored_edge`]: DecisionGraph::add_unexplored_edge
    pub fn add_unexplored_edge_with(
        &mut self,
        from: &str,
        name: impl Into<Transition>,
        destination_name: Option<&str>,
        reciprocal: Option<&str>,
        forward: EdgeOptions,
        reverse: EdgeOptions,
    ) -> Result<Decision, GraphError> {
        let name = name.into();
        if !self.contains(from) {
            return Err(GraphError::MissingDecision(from.to_string()));
        }
        if self.get_destination(from, &name).is_some() {
            return Err(GraphError::TransitionCollision {
                decision: from.to_string(),
                transition: name,
            });
        }
        if let Some(dest) = destination_name {
            if self.contains(dest) {
                return Err(GraphError::DecisionCollision(dest.to_string()));
            }
        }

        let to_name = match destination_name {
            Some(dest) => dest.to_string(),
            None => format!("_u.{}", self.unknown_count),
        };
        // The counter tracks every unknown ever created, named or not
        self.unknown_count += 1;

        self.add_decision_with(
            &to_name,
            [UNKNOWN_TAG.to_string()].into_iter().collect(),
            Vec::new(),
        )?;
        self.add_transition_with(
            from,
            name.clone(),
            &to_name,
            None,
            forward,
            EdgeOptions::default(),
        )?;

        if let Some(recip) = reciprocal {
            self.add_transition_with(
                &to_name,
                recip,
                from,
                None,
                reverse,
                EdgeOptions::default(),
            )?;
            self.set_reciprocal(from, &name, Some(recip))?;
        }

        Ok(to_name)
    }

    /// Add an `_e:<name>` ending transition and decision, both tagged
    /// `ending`. Returns the augmented name used for both.
    pub fn add_ending(
        &mut self,
        from: &str,
        name: &str,
    ) -> Result<Transition, GraphError> {
        if !self.contains(from) {
            return Err(GraphError::MissingDecision(from.to_string()));
        }
        let augmented = format!("_e:{name}");
        if self.get_destination(from, &augmented).is_some() {
            return Err(GraphError::TransitionCollision {
                decision: from.to_string(),
                transition: augmented,
            });
        }

        if !self.contains(&augmented) {
            self.add_decision_with(
                &augmented,
                [ENDING_TAG.to_string()].into_iter().collect(),
                Vec::new(),
            )?;
        } else {
            self.tag_decision(&augmented, ENDING_TAG)?;
        }

        self.add_transition_with(
            from,
            augmented.clone(),
            &augmented,
            None,
            EdgeOptions {
                tags: [ENDING_TAG.to_string()].into_iter().collect(),
                ..EdgeOptions::default()
            },
            EdgeOptions::default(),
        )?;

        Ok(augmented)
    }

    // --- Surgery ---

    /// Point a transition at a new destination.
    ///
    /// With `swap_reciprocal` (the usual case) the old reciprocal edge
    /// is moved to the new destination so the relationship survives;
    /// otherwise the relationship is severed and the old reciprocal edge
    /// left alone. A moved reciprocal whose name collides at the new
    /// destination either errors or is renamed with a suffix, per
    /// `error_on_name_collision`. Returns the (possibly renamed)
    /// reciprocal, or `None` if there wasn't one.
    pub fn retarget_transition(
        &mut self,
        from: &str,
        transition: &str,
        new_destination: &str,
        swap_reciprocal: bool,
        error_on_name_collision: bool,
    ) -> Result<Option<Transition>, GraphError> {
        let old_destination = self.destination(from, transition)?;
        let mut reciprocal = self.get_reciprocal(from, transition);

        if old_destination == new_destination {
            return Ok(reciprocal);
        }

        // Move the reciprocal first so a collision errors out before
        // any changes to the forward edge.
        if swap_reciprocal {
            if let Some(recip) = reciprocal.clone() {
                reciprocal = Some(self.rebase_transition(
                    &old_destination,
                    &recip,
                    new_destination,
                    false,
                    error_on_name_collision,
                )?);
            }
        }

        let properties = self.edge(from, transition)?.properties();
        self.remove_edge_by_key(from, transition);
        self.add_transition(from, transition, new_destination, None)?;
        self.set_transition_properties(from, transition, &properties)?;

        if let Some(recip) = &reciprocal {
            if swap_reciprocal {
                self.set_reciprocal(from, transition, Some(recip))?;
            } else if self.get_destination(&old_destination, recip).is_some() {
                // Sever one-sidedly; the forward pointer died with the
                // removed edge.
                self.set_reciprocal_with(&old_destination, recip, None, false, true)?;
            }
        }

        Ok(reciprocal)
    }

    /// Move a transition to a new source decision.
    ///
    /// With `swap_reciprocal` the reciprocal edge is retargeted to point
    /// at the new source; otherwise the relationship is severed. A name
    /// collision at the new source either errors or renames with a
    /// suffix. Returns the (possibly renamed) transition name.
    pub fn rebase_transition(
        &mut self,
        from: &str,
        transition: &str,
        new_base: &str,
        swap_reciprocal: bool,
        error_on_name_collision: bool,
    ) -> Result<Transition, GraphError> {
        if new_base == from {
            return Ok(transition.to_string());
        }

        let destination = self.destination(from, transition)?;
        let mut reciprocal = self.get_reciprocal(from, transition);
        // The pointer may be stale mid-surgery; ignore it if so
        if let Some(recip) = &reciprocal {
            if self.get_destination(&destination, recip).is_none() {
                reciprocal = None;
            }
        }

        let properties = self.edge(from, transition)?.properties();

        let target_outgoing = self.destinations_from(new_base)?;
        let new_name = if target_outgoing.contains_key(transition) {
            if error_on_name_collision {
                return Err(GraphError::TransitionCollision {
                    decision: new_base.to_string(),
                    transition: transition.to_string(),
                });
            }
            unique_name(transition, |n| target_outgoing.contains_key(n))
        } else {
            transition.to_string()
        };

        self.remove_edge_by_key(from, transition);
        self.add_transition(new_base, new_name.clone(), &destination, None)?;
        self.set_transition_properties(new_base, &new_name, &properties)?;

        if let Some(recip) = reciprocal {
            if swap_reciprocal {
                self.retarget_transition(&destination, &recip, new_base, false, true)?;
                self.set_reciprocal(new_base, &new_name, Some(&recip))?;
            } else {
                self.set_reciprocal_with(&destination, &recip, None, false, true)?;
            }
        }

        Ok(new_name)
    }

    /// Merge one decision into another, retargeting every incoming and
    /// outgoing edge onto the survivor. Same-named outgoing transitions
    /// either error or get suffix-renamed (only `merge`-side edges are
    /// renamed). Tags union, annotations concatenate, zone memberships
    /// transfer, and `merge` is deleted. A no-op when both names match.
    /// Returns the renames that were applied.
    pub fn merge_decisions(
        &mut self,
        merge: &str,
        merge_into: &str,
        error_on_name_collision: bool,
    ) -> Result<RenameMap, GraphError> {
        let mut renames = RenameMap::new();
        if merge == merge_into {
            return Ok(renames);
        }

        let merge_outgoing: BTreeSet<Transition> =
            self.destinations_from(merge)?.into_keys().collect();
        let target_outgoing: BTreeSet<Transition> =
            self.destinations_from(merge_into)?.into_keys().collect();
        let collisions: Vec<&Transition> = merge_outgoing.intersection(&target_outgoing).collect();
        if !collisions.is_empty() && error_on_name_collision {
            return Err(GraphError::TransitionCollision {
                decision: merge_into.to_string(),
                transition: collisions[0].clone(),
            });
        }

        let zone_parents = self.zone_parents(merge)?;

        // Swap incoming edges (with their reciprocals). Self-loops can
        // disappear mid-loop when their reciprocal was processed first.
        for (source, incoming) in self.all_edges_to(merge) {
            if self.get_destination(&source, &incoming).is_none() {
                continue;
            }
            let outgoing = self.get_reciprocal(&source, &incoming);
            let new_outgoing =
                self.retarget_transition(&source, &incoming, merge_into, true, false)?;
            if let (Some(old), Some(new)) = (outgoing, new_outgoing) {
                if old != new {
                    renames.insert(old, new);
                }
            }
        }

        // Rebase any outgoing edges that had no reciprocal
        let still_outgoing: Vec<Transition> =
            self.destinations_from(merge)?.into_keys().collect();
        for transition in still_outgoing {
            let new_name = self.rebase_transition(merge, &transition, merge_into, true, false)?;
            if transition != new_name {
                renames.insert(transition, new_name);
            }
        }

        debug_assert!(self.node(merge)?.outgoing.is_empty());
        debug_assert!(self.all_edges_to(merge).is_empty());

        // Union tags, concatenate annotations
        let merged_node = self.node(merge)?.clone();
        let target = self.node_mut(merge_into)?;
        target.tags.extend(merged_node.tags);
        target.annotations.extend(merged_node.annotations);

        for zone in zone_parents {
            self.add_decision_to_zone(merge_into, &zone)?;
        }

        self.remove_decision(merge)?;

        Ok(renames)
    }

    /// Delete a decision, its remaining edges, and its zone memberships.
    pub fn remove_decision(&mut self, decision: &str) -> Result<(), GraphError> {
        if !self.contains(decision) {
            return Err(GraphError::MissingDecision(decision.to_string()));
        }
        let zones: Vec<Zone> = self.zones.keys().cloned().collect();
        for zone in zones {
            self.remove_decision_from_zone(decision, &zone);
        }
        for (source, transition) in self.all_edges_to(decision) {
            if source != decision {
                self.remove_edge_by_key(&source, &transition);
            }
        }
        self.decisions.remove(decision);
        self.zone_map.remove(decision);
        Ok(())
    }

    /// Rename a decision by merging it into a fresh decision with the
    /// new name. Returns any transition renames (normally empty).
    pub fn rename_decision(
        &mut self,
        decision: &str,
        new_name: &str,
    ) -> Result<RenameMap, GraphError> {
        if self.contains(new_name) {
            return Err(GraphError::DecisionCollision(new_name.to_string()));
        }
        self.add_decision(new_name)?;
        self.merge_decisions(decision, new_name, true)
    }

    /// Merge one transition into another at the same decision. Both
    /// must share a destination. Properties combine via
    /// `merge_properties`; the absorbed transition is deleted. With
    /// `merge_reciprocal` the reciprocal edges fold together the same
    /// way; otherwise the absorbed side's reciprocal relationship is
    /// severed.
    pub fn merge_transitions(
        &mut self,
        from: &str,
        merge: &str,
        merge_into: &str,
        merge_reciprocal: bool,
    ) -> Result<(), GraphError> {
        if merge == merge_into {
            return Ok(());
        }

        let dest1 = self.destination(from, merge)?;
        let dest2 = self.destination(from, merge_into)?;
        if dest1 != dest2 {
            return Err(GraphError::InvalidDestination(format!(
                "cannot merge transition '{merge}' into '{merge_into}' at '{from}': their \
                 destinations differ ('{dest1}' vs '{dest2}'); retarget first"
            )));
        }

        let props1 = self.get_transition_properties(from, merge)?;
        let props2 = self.get_transition_properties(from, merge_into)?;
        let merged = merge_properties(Some(&props1), Some(&props2));
        self.set_transition_properties(from, merge_into, &merged)?;

        let reciprocal = self.get_reciprocal(from, merge_into);
        let alt_reciprocal = self.get_reciprocal(from, merge);

        if alt_reciprocal != reciprocal {
            if !merge_reciprocal {
                if let Some(alt) = &alt_reciprocal {
                    self.set_reciprocal(&dest1, alt, None)?;
                }
            } else if let Some(alt) = &alt_reciprocal {
                match &reciprocal {
                    None => {
                        // The absorbed side's reciprocal survives as the
                        // reciprocal of the merged transition.
                        self.set_reciprocal(from, merge_into, Some(alt))?;
                    }
                    Some(recip) => {
                        let r_props1 = self.get_transition_properties(&dest1, alt)?;
                        let r_props2 = self.get_transition_properties(&dest2, recip)?;
                        let merged_rev = merge_properties(Some(&r_props1), Some(&r_props2));
                        self.set_transition_properties(&dest1, recip, &merged_rev)?;
                        self.remove_edge_by_key(&dest1, alt);
                    }
                }
            }
        }

        self.remove_edge_by_key(from, merge);
        Ok(())
    }

    /// Resolve the mystery at the end of a transition: merge the
    /// unknown destination into a new or existing decision and (when a
    /// reverse name is given) wire up a reciprocal. See
    /// [`replace_unexplored_with`] for the full contract.
    ///
    /// [`replace_unexplored_with`]: DecisionGraph::replace_unexplored_with
    pub fn replace_unexplored(
        &mut self,
        from: &str,
        transition: &str,
        connect_to: Option<&str>,
        rev_name: Option<&str>,
    ) -> Result<RenameMaps, GraphError> {
        self.replace_unexplored_with(from, transition, connect_to, rev_name, ReplaceOptions::default())
    }

    /// Resolve an unknown destination, with full control.
    ///
    /// The transition must currently lead to an unknown decision. That
    /// placeholder is merged into `connect_to` — created if absent; when
    /// omitted, default `_u.N` names become `_x.N`. If `rev_name` is
    /// given, the reverse transition from `connect_to` is wired as the
    /// reciprocal; if it already exists it must lead to an unknown
    /// decision, which is then merged into the source. Additional edges
    /// at the merged placeholders are retargeted, renaming on collision.
    /// Returns the rename maps for the destination and source sides.
    pub fn replace_unexplored_with(
        &mut self,
        from: &str,
        transition: &str,
        connect_to: Option<&str>,
        rev_name: Option<&str>,
        opts: ReplaceOptions,
    ) -> Result<RenameMaps, GraphError> {
        let old_unknown = self.destination(from, transition)?;
        if !self.is_unknown(&old_unknown)? {
            return Err(GraphError::UnknownDestination(format!(
                "transition '{transition}' from '{from}' leads to '{old_unknown}', which is \
                 not an unexplored decision"
            )));
        }

        // A reverse transition already present at the placeholder must
        // lead back to the source.
        let mut rev_from_unknown: Option<Decision> = None;
        if let Some(rev) = rev_name {
            rev_from_unknown = self.get_destination(&old_unknown, rev);
            if let Some(dest) = &rev_from_unknown {
                if dest != from {
                    return Err(GraphError::TransitionCollision {
                        decision: old_unknown,
                        transition: rev.to_string(),
                    });
                }
            }
        }

        let connect_to: Decision = match connect_to {
            Some(name) => name.to_string(),
            None => match old_unknown.strip_prefix("_u.") {
                Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
                    unique_name(&format!("_x.{digits}"), |n| self.contains(n))
                }
                _ => old_unknown.clone(),
            },
        };

        let mut needs_zone_info = false;
        let mut other_old_unknown: Option<Decision> = None;
        if self.contains(&connect_to) {
            if let Some(rev) = rev_name {
                other_old_unknown = self.get_destination(&connect_to, rev);
                if let Some(other) = &other_old_unknown {
                    if !self.is_unknown(other)? {
                        return Err(GraphError::UnknownDestination(format!(
                            "reciprocal transition '{rev}' from '{connect_to}' leads to \
                             '{other}', which is not an unexplored decision"
                        )));
                    }
                }
            }
            for tag in opts.decision_tags.clone() {
                self.tag_decision(&connect_to, tag)?;
            }
            for annotation in opts.decision_annotations.clone() {
                self.annotate_decision(&connect_to, annotation)?;
            }
            // An unknown target was never given zone info at creation
            if self.is_unknown(&connect_to)? {
                needs_zone_info = true;
            }
        } else {
            needs_zone_info = true;
            self.add_decision_with(
                &connect_to,
                opts.decision_tags.clone(),
                opts.decision_annotations.clone(),
            )?;
        }

        let old_reciprocal = self.get_reciprocal(from, transition);

        let mut dest_renames = self.merge_decisions(&old_unknown, &connect_to, false)?;
        let mut source_renames = RenameMap::new();
        self.untag_decision(&connect_to, UNKNOWN_TAG)?;

        match opts.place_in_zone.clone() {
            ZonePlacement::Unchanged => {}
            ZonePlacement::Inherit => {
                if needs_zone_info {
                    for parent in self.zone_parents(&connect_to)? {
                        self.remove_decision_from_zone(&connect_to, &parent);
                    }
                    for parent in self.zone_parents(from)? {
                        self.add_decision_to_zone(&connect_to, &parent)?;
                    }
                }
            }
            ZonePlacement::Named(zone) => {
                if self.get_zone_info(&zone).is_none() {
                    self.create_zone(&zone, 0)?;
                    for parent in self.zone_parents(from)? {
                        for grandparent in self.zone_parents(&parent)? {
                            self.add_zone_to_zone(&zone, &grandparent)?;
                        }
                    }
                }
                for parent in self.zone_parents(&connect_to)? {
                    self.remove_decision_from_zone(&connect_to, &parent);
                }
                self.add_decision_to_zone(&connect_to, &zone)?;
            }
        }

        if let Some(rev) = rev_name {
            let other_old_reciprocal: Option<Transition>;
            if other_old_unknown.is_none() && rev_from_unknown.is_none() {
                self.add_transition(&connect_to, rev, from, None)?;
                other_old_reciprocal = None;
            } else if let Some(other) = other_old_unknown.clone() {
                other_old_reciprocal = self.get_reciprocal(&connect_to, rev);
                source_renames = self.merge_decisions(&other, from, false)?;
                self.untag_decision(from, UNKNOWN_TAG)?;
            } else {
                // The reverse transition already exists at the
                // placeholder and points home; the merge carried it over.
                other_old_reciprocal = None;
            }

            self.set_reciprocal(from, transition, Some(rev))?;

            // Fold together transitions that the merges made redundant:
            // the old reciprocal joins the reverse edge, the reverse
            // edge's old reciprocal joins the target transition, and a
            // rename-displaced reverse edge joins the reverse edge.
            if let Some(old_recip) = &old_reciprocal {
                let old_rev = dest_renames
                    .get(old_recip)
                    .cloned()
                    .unwrap_or_else(|| old_recip.clone());
                if self.get_destination(&connect_to, &old_rev).is_some() {
                    self.merge_transitions(&connect_to, &old_rev, rev, false)?;
                    dest_renames.remove(old_recip);
                }
            }

            if let Some(other_recip) = &other_old_reciprocal {
                let other_rev = source_renames
                    .get(other_recip)
                    .cloned()
                    .unwrap_or_else(|| other_recip.clone());
                self.merge_transitions(from, &other_rev, transition, false)?;
                source_renames.remove(other_recip);
            }

            if let Some(extra) = dest_renames.get(rev).cloned() {
                self.merge_transitions(&connect_to, &extra, rev, false)?;
                dest_renames.remove(rev);
            }
        }

        for tag in opts.tags {
            self.tag_transition(from, transition, tag)?;
        }
        for annotation in opts.annotations {
            self.annotate_transition(from, transition, annotation)?;
        }
        if let Some(rev) = rev_name {
            for tag in opts.rev_tags {
                self.tag_transition(&connect_to, rev, tag)?;
            }
            for annotation in opts.rev_annotations {
                self.annotate_transition(&connect_to, rev, annotation)?;
            }
        }

        if let Some(requirement) = opts.requirement {
            self.set_transition_requirement(from, transition, requirement)?;
        }
        if let Some(effects) = opts.effects {
            self.set_transition_effects(from, transition, effects)?;
        }
        if let Some(rev) = rev_name {
            if let Some(requirement) = opts.rev_requirement {
                self.set_transition_requirement(&connect_to, rev, requirement)?;
            }
            if let Some(effects) = opts.rev_effects {
                self.set_transition_effects(&connect_to, rev, effects)?;
            }
        }

        Ok(RenameMaps {
            at_destination: dest_renames,
            at_source: source_renames,
        })
    }
}
