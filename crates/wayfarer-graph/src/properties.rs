//! Bundled transition properties and their merge rules.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use wayfarer_core::effect::{merge_effects, TransitionEffect};
use wayfarer_core::requirement::Requirement;
use wayfarer_core::types::{Annotation, Tag};

/// The properties of a transition, minus its reciprocal pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionProperties {
    pub requirement: Requirement,
    pub effects: Vec<TransitionEffect>,
    pub tags: BTreeSet<Tag>,
    pub annotations: Vec<Annotation>,
}

/// Merge two property bundles.
///
/// Tags union; annotations concatenate a-then-b; effects merge via
/// `merge_effects`. If either requirement is `Nothing` the other is
/// used; otherwise both are combined under an `All`.
pub fn merge_properties(
    a: Option<&TransitionProperties>,
    b: Option<&TransitionProperties>,
) -> TransitionProperties {
    let (a, b) = match (a, b) {
        (None, None) => return TransitionProperties::default(),
        (Some(a), None) => return a.clone(),
        (None, Some(b)) => return b.clone(),
        (Some(a), Some(b)) => (a, b),
    };

    let requirement = if a.requirement == Requirement::Nothing {
        b.requirement.clone()
    } else if b.requirement == Requirement::Nothing {
        a.requirement.clone()
    } else {
        Requirement::All(vec![a.requirement.clone(), b.requirement.clone()])
    };

    TransitionProperties {
        requirement,
        effects: merge_effects(&a.effects, &b.effects),
        tags: a.tags.union(&b.tags).cloned().collect(),
        annotations: a
            .annotations
            .iter()
            .chain(b.annotations.iter())
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(requirement: &str, tags: &[&str]) -> TransitionProperties {
        TransitionProperties {
            requirement: Requirement::parse(requirement).unwrap(),
            effects: Vec::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            annotations: Vec::new(),
        }
    }

    #[test]
    fn none_sides() {
        assert_eq!(merge_properties(None, None), TransitionProperties::default());
        let a = props("dash", &["wide"]);
        assert_eq!(merge_properties(Some(&a), None), a);
        assert_eq!(merge_properties(None, Some(&a)), a);
    }

    #[test]
    fn nothing_requirement_defers() {
        let a = props("O", &[]);
        let b = props("dash", &[]);
        let merged = merge_properties(Some(&a), Some(&b));
        assert_eq!(merged.requirement, Requirement::parse("dash").unwrap());
    }

    #[test]
    fn complex_requirements_conjoin() {
        let a = props("dash", &[]);
        let b = props("slide", &[]);
        let merged = merge_properties(Some(&a), Some(&b));
        assert_eq!(
            merged.requirement,
            Requirement::All(vec![
                Requirement::parse("dash").unwrap(),
                Requirement::parse("slide").unwrap(),
            ])
        );
    }

    #[test]
    fn tags_union_annotations_concat() {
        let mut a = props("O", &["narrow"]);
        a.annotations.push("first".to_string());
        let mut b = props("O", &["dark", "narrow"]);
        b.annotations.push("second".to_string());
        let merged = merge_properties(Some(&a), Some(&b));
        assert_eq!(merged.tags.len(), 2);
        assert_eq!(merged.annotations, vec!["first", "second"]);
    }
}
