//! Zone hierarchy: leveled containment groups over decisions.
//!
//! A zone has an integer level; level 0 sits directly above decisions.
//! Zones may contain decisions and zones of strictly lower levels, and
//! may have multiple parents (the hierarchy is a DAG, not a tree).
//! Acyclicity falls out of the level ordering.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use wayfarer_core::types::{Decision, Transition, Zone};

use crate::error::GraphError;
use crate::graph::DecisionGraph;

/// Level, parents, and contents of one zone. Contents mix decisions and
/// sub-zones; which is which is determined by lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneInfo {
    pub level: u32,
    pub parents: BTreeSet<Zone>,
    pub contents: BTreeSet<String>,
}

impl DecisionGraph {
    /// Create an empty zone at the given level. The name must not be in
    /// use by another zone or a decision.
    pub fn create_zone(&mut self, zone: impl Into<Zone>, level: u32) -> Result<(), GraphError> {
        let zone = zone.into();
        if self.zones.contains_key(&zone) {
            return Err(GraphError::ZoneCollision(zone));
        }
        if self.contains(&zone) {
            return Err(GraphError::ZoneCollision(zone));
        }
        self.zones.insert(
            zone,
            ZoneInfo {
                level,
                parents: BTreeSet::new(),
                contents: BTreeSet::new(),
            },
        );
        Ok(())
    }

    /// The info for a zone, or `None` if it doesn't exist.
    pub fn get_zone_info(&self, zone: &str) -> Option<&ZoneInfo> {
        self.zones.get(zone)
    }

    /// Iterate over all zone names.
    pub fn zone_names(&self) -> impl Iterator<Item = &Zone> {
        self.zones.keys()
    }

    /// Number of zones.
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Delete a zone, detaching its contents and parents. Returns the
    /// deleted info.
    pub fn delete_zone(&mut self, zone: &str) -> Result<ZoneInfo, GraphError> {
        let info = self
            .zones
            .remove(zone)
            .ok_or_else(|| GraphError::MissingZone(zone.to_string()))?;
        for item in &info.contents {
            if let Some(zones) = self.zone_map.get_mut(item) {
                zones.remove(zone);
            }
            if let Some(sub) = self.zones.get_mut(item) {
                sub.parents.remove(zone);
            }
        }
        for parent in &info.parents {
            if let Some(up) = self.zones.get_mut(parent) {
                up.contents.remove(zone);
            }
        }
        Ok(info)
    }

    /// Add a decision directly to a zone (normally a level-0 zone).
    pub fn add_decision_to_zone(&mut self, decision: &str, zone: &str) -> Result<(), GraphError> {
        if !self.contains(decision) {
            return Err(GraphError::MissingDecision(decision.to_string()));
        }
        let info = self
            .zones
            .get_mut(zone)
            .ok_or_else(|| GraphError::MissingZone(zone.to_string()))?;
        info.contents.insert(decision.to_string());
        self.zone_map
            .entry(decision.to_string())
            .or_default()
            .insert(zone.to_string());
        Ok(())
    }

    /// Remove a decision from direct membership in a zone. Returns
    /// whether it was a member. Membership through sub-zones is
    /// unaffected.
    pub fn remove_decision_from_zone(&mut self, decision: &str, zone: &str) -> bool {
        let Some(info) = self.zones.get_mut(zone) else {
            return false;
        };
        if !info.contents.remove(decision) {
            return false;
        }
        if let Some(zones) = self.zone_map.get_mut(decision) {
            zones.remove(zone);
        }
        true
    }

    /// Add a zone to another zone. The added zone must sit at a
    /// strictly lower level. A missing zone on either side is created
    /// one level below/above the other; if neither exists that's an
    /// error.
    pub fn add_zone_to_zone(&mut self, add_it: &str, add_to: &str) -> Result<(), GraphError> {
        let add_level = self.zones.get(add_it).map(|i| i.level);
        let to_level = self.zones.get(add_to).map(|i| i.level);

        let (add_level, to_level) = match (add_level, to_level) {
            (None, None) => {
                return Err(GraphError::MissingZone(add_it.to_string()));
            }
            (None, Some(to)) => {
                let new_level = to.checked_sub(1).ok_or_else(|| {
                    GraphError::InvalidLevel(format!(
                        "zone '{add_to}' is at level {to}; nothing can nest beneath it"
                    ))
                })?;
                self.create_zone(add_it, new_level)?;
                (new_level, to)
            }
            (Some(add), None) => {
                let new_level = add + 1;
                self.create_zone(add_to, new_level)?;
                (add, new_level)
            }
            (Some(add), Some(to)) => (add, to),
        };

        if add_level >= to_level {
            return Err(GraphError::InvalidLevel(format!(
                "cannot add zone '{add_it}' at level {add_level} to zone '{add_to}' at level \
                 {to_level}: zones only contain zones of lower levels"
            )));
        }

        self.zones
            .get_mut(add_to)
            .expect("checked above")
            .contents
            .insert(add_it.to_string());
        self.zones
            .get_mut(add_it)
            .expect("checked above")
            .parents
            .insert(add_to.to_string());
        Ok(())
    }

    /// Remove a zone from another zone's contents. Returns whether it
    /// was a member (false also when either zone doesn't exist).
    pub fn remove_zone_from_zone(&mut self, remove_it: &str, remove_from: &str) -> bool {
        if !self.zones.contains_key(remove_it) || !self.zones.contains_key(remove_from) {
            return false;
        }
        if !self.zones[remove_from].contents.contains(remove_it) {
            return false;
        }
        if let Some(info) = self.zones.get_mut(remove_it) {
            info.parents.remove(remove_from);
        }
        if let Some(info) = self.zones.get_mut(remove_from) {
            info.contents.remove(remove_it);
        }
        true
    }

    /// Decisions directly in a zone (not counting sub-zone members).
    pub fn decisions_in_zone(&self, zone: &str) -> Result<BTreeSet<Decision>, GraphError> {
        let info = self
            .get_zone_info(zone)
            .ok_or_else(|| GraphError::MissingZone(zone.to_string()))?;
        Ok(info
            .contents
            .iter()
            .filter(|item| !self.zones.contains_key(*item))
            .cloned()
            .collect())
    }

    /// Immediate sub-zones of a zone.
    pub fn sub_zones(&self, zone: &str) -> Result<BTreeSet<Zone>, GraphError> {
        let info = self
            .get_zone_info(zone)
            .ok_or_else(|| GraphError::MissingZone(zone.to_string()))?;
        Ok(info
            .contents
            .iter()
            .filter(|item| self.zones.contains_key(*item))
            .cloned()
            .collect())
    }

    /// All decisions in a zone, including those reached through
    /// sub-zones. `None` if the zone doesn't exist.
    pub fn all_decisions_in_zone(&self, zone: &str) -> Option<BTreeSet<Decision>> {
        let info = self.get_zone_info(zone)?;
        let mut result = BTreeSet::new();
        for item in &info.contents {
            if self.zones.contains_key(item) {
                result.extend(self.all_decisions_in_zone(item)?);
            } else {
                result.insert(item.clone());
            }
        }
        Some(result)
    }

    /// The level of a zone.
    pub fn zone_hierarchy_level(&self, zone: &str) -> Result<u32, GraphError> {
        self.get_zone_info(zone)
            .map(|info| info.level)
            .ok_or_else(|| GraphError::MissingZone(zone.to_string()))
    }

    /// The zones directly containing a zone or decision.
    pub fn zone_parents(&self, zone_or_decision: &str) -> Result<BTreeSet<Zone>, GraphError> {
        if let Some(info) = self.zones.get(zone_or_decision) {
            return Ok(info.parents.clone());
        }
        if self.contains(zone_or_decision) {
            return Ok(self
                .zone_map
                .get(zone_or_decision)
                .cloned()
                .unwrap_or_default());
        }
        Err(GraphError::MissingDecision(zone_or_decision.to_string()))
    }

    /// All zones containing a zone or decision, directly or indirectly.
    /// The target itself is not included.
    pub fn zone_ancestors(&self, zone_or_decision: &str) -> Result<BTreeSet<Zone>, GraphError> {
        self.zone_ancestors_excluding(zone_or_decision, &BTreeSet::new())
    }

    fn zone_ancestors_excluding(
        &self,
        target: &str,
        exclude: &BTreeSet<Zone>,
    ) -> Result<BTreeSet<Zone>, GraphError> {
        let mut result = &self.zone_parents(target)? - exclude;
        // Walk upward, excluding results-so-far so braided inclusion
        // paths aren't re-enumerated
        for parent in result.clone() {
            let seen = &result | exclude;
            result.extend(self.zone_ancestors_excluding(&parent, &seen)?);
        }
        Ok(result)
    }

    /// Classify every transition crossing a zone's boundary (sub-zone
    /// members included) into outgoing and incoming sets of
    /// (source, transition) pairs. `None` if the zone doesn't exist.
    /// Linear in the total number of edges regardless of zone size.
    #[allow(clippy::type_complexity)]
    pub fn zone_edges(
        &self,
        zone: &str,
    ) -> Option<(
        BTreeSet<(Decision, Transition)>,
        BTreeSet<(Decision, Transition)>,
    )> {
        let interior = self.all_decisions_in_zone(zone)?;
        let mut outgoing = BTreeSet::new();
        let mut incoming = BTreeSet::new();

        for (source, node) in &self.decisions {
            for (name, data) in &node.outgoing {
                let source_in = interior.contains(source);
                let dest_in = interior.contains(&data.to);
                if source_in && !dest_in {
                    outgoing.insert((source.clone(), name.clone()));
                } else if dest_in && !source_in {
                    incoming.insert((source.clone(), name.clone()));
                }
            }
        }

        Some((outgoing, incoming))
    }

    /// Collapse the zones at one hierarchy level above a decision into a
    /// single named zone.
    ///
    /// All ancestors of `target` at exactly `level` are replaced: their
    /// ancestor-children move into `zone`, and `zone` is adopted by all
    /// their parents. When no ancestor sits exactly at `level`, the
    /// nearest populated level below contributes the children (down to
    /// the decision itself) and the nearest populated level above the
    /// parents. The named zone is created at `level` if absent; an
    /// existing zone at a different level is an error.
    pub fn replace_zones_in_hierarchy(
        &mut self,
        target: &str,
        zone: &str,
        level: u32,
    ) -> Result<(), GraphError> {
        if !self.contains(target) {
            return Err(GraphError::MissingDecision(target.to_string()));
        }
        match self.get_zone_info(zone) {
            None => self.create_zone(zone, level)?,
            Some(info) if info.level != level => {
                return Err(GraphError::InvalidLevel(format!(
                    "target level {level} does not match zone '{zone}' at level {}",
                    info.level
                )));
            }
            Some(_) => {}
        }

        let parents = self.zone_parents(target)?;
        let ancestors = self.zone_ancestors(target)?;

        let mut level_map: BTreeMap<u32, BTreeSet<Zone>> = BTreeMap::new();
        let mut highest: Option<u32> = None;
        for ancestor in &ancestors {
            let ancestor_level = self.zone_hierarchy_level(ancestor)?;
            level_map
                .entry(ancestor_level)
                .or_default()
                .insert(ancestor.clone());
            highest = Some(highest.map_or(ancestor_level, |h| h.max(ancestor_level)));
        }

        let mut reparent_decision = false;
        let (below, above) = if let Some(replaced_zones) = level_map.get(&level).cloned() {
            let mut above = BTreeSet::new();
            let mut below = BTreeSet::new();
            for replaced in &replaced_zones {
                above.extend(self.zone_parents(replaced)?);
                below.extend(self.sub_zones(replaced)?);
                if parents.contains(replaced) {
                    reparent_decision = true;
                }
            }
            // Only ancestors of the target get re-parented
            below = &below & &ancestors;
            (below, above)
        } else {
            let mut below = BTreeSet::new();
            let mut probe = level;
            while below.is_empty() && probe > 0 {
                probe -= 1;
                below = level_map.get(&probe).cloned().unwrap_or_default();
            }
            if below.is_empty() {
                reparent_decision = true;
            }

            let mut above = BTreeSet::new();
            if let Some(highest) = highest {
                let mut probe = level + 1;
                above = level_map.get(&probe).cloned().unwrap_or_default();
                while above.is_empty() && probe < highest {
                    probe += 1;
                    above = level_map.get(&probe).cloned().unwrap_or_default();
                }
            }
            (below, above)
        };

        for under in &below {
            for parent in self.zone_parents(under)? {
                if ancestors.contains(&parent) {
                    self.remove_zone_from_zone(under, &parent);
                }
            }
            self.add_zone_to_zone(under, zone)?;
        }

        for parent in &above {
            self.add_zone_to_zone(zone, parent)?;
        }

        if reparent_decision {
            for parent in &parents {
                self.remove_decision_from_zone(target, parent);
            }
            self.add_decision_to_zone(target, zone)?;
        }

        Ok(())
    }
}
