//! Dispatch for scripted graph and exploration method calls.
//!
//! `call graph <name>` and `call exploration <name>` commands route
//! through an explicit name-to-handler table. Handlers pull their
//! arguments by parameter name out of the scope: a missing required
//! argument is a type error, optional arguments fall back to their
//! defaults, and the handler's return value becomes the new current
//! value. Zone arguments follow a three-way convention: absent means
//! "inherit from the origin", `None` means "leave zones alone", and a
//! string names (and if needed creates) the zone. Step operations that
//! can produce blocked-traversal warnings return them as a list of
//! strings.

use std::collections::BTreeMap;

use wayfarer_core::requirement::Requirement;
use wayfarer_graph::{DecisionGraph, GraphError, RenameMap, ZonePlacement};
use wayfarer_script::{CallHost, Fault, Scope, Value};

use crate::error::{ExploreError, TransitionBlocked};
use crate::exploration::{Exploration, ObserveEntry, ReZoneTarget};

impl CallHost for Exploration {
    fn call_graph(&mut self, function: &str, scope: &mut Scope) -> Result<Value, Fault> {
        let graph = self
            .current_graph_mut()
            .map_err(|e| Fault::Other(e.to_string()))?;
        dispatch_graph(graph, function, scope)
    }

    fn call_exploration(&mut self, function: &str, scope: &mut Scope) -> Result<Value, Fault> {
        dispatch_exploration(self, function, scope)
    }
}

fn graph_fault(error: GraphError) -> Fault {
    match &error {
        GraphError::MissingDecision(_)
        | GraphError::MissingTransition { .. }
        | GraphError::MissingZone(_) => Fault::Key(error.to_string()),
        _ => Fault::Value(error.to_string()),
    }
}

fn explore_fault(error: ExploreError) -> Fault {
    match error {
        ExploreError::Graph(inner) => graph_fault(inner),
        other => Fault::Other(other.to_string()),
    }
}

fn required_str(scope: &Scope, name: &str) -> Result<String, Fault> {
    match scope.get(name) {
        None => Err(Fault::Type(format!(
            "no variable named '{name}' supplies the required parameter of that name"
        ))),
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(Fault::Type(format!(
            "parameter '{name}' must be a string, got {}",
            other.type_name()
        ))),
    }
}

fn optional_str(scope: &Scope, name: &str) -> Result<Option<String>, Fault> {
    match scope.get(name) {
        None | Some(Value::None) => Ok(None),
        Some(Value::Str(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Fault::Type(format!(
            "parameter '{name}' must be a string or None, got {}",
            other.type_name()
        ))),
    }
}

fn required_int(scope: &Scope, name: &str) -> Result<i64, Fault> {
    match scope.get(name) {
        None => Err(Fault::Type(format!(
            "no variable named '{name}' supplies the required parameter of that name"
        ))),
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => Err(Fault::Type(format!(
            "parameter '{name}' must be an integer, got {}",
            other.type_name()
        ))),
    }
}

fn flag(scope: &Scope, name: &str, default: bool) -> Result<bool, Fault> {
    match scope.get(name) {
        None => Ok(default),
        Some(value) => Ok(value.truthy()),
    }
}

fn optional_requirement(scope: &Scope, name: &str) -> Result<Option<Requirement>, Fault> {
    match optional_str(scope, name)? {
        None => Ok(None),
        Some(text) => Requirement::parse(&text)
            .map(Some)
            .map_err(|e| Fault::Value(e.to_string())),
    }
}

/// Absent = inherit, None = unchanged, a string = that zone.
fn zone_placement(scope: &Scope, name: &str) -> Result<ZonePlacement, Fault> {
    match scope.get(name) {
        None => Ok(ZonePlacement::Inherit),
        Some(Value::None) => Ok(ZonePlacement::Unchanged),
        Some(Value::Str(zone)) => Ok(ZonePlacement::Named(zone.clone())),
        Some(other) => Err(Fault::Type(format!(
            "parameter '{name}' must be a zone name or None, got {}",
            other.type_name()
        ))),
    }
}

fn rename_map_value(renames: &RenameMap) -> Value {
    let entries: BTreeMap<Value, Value> = renames
        .iter()
        .map(|(old, new)| (Value::Str(old.clone()), Value::Str(new.clone())))
        .collect();
    Value::Dict(entries)
}

fn warnings_value(warnings: &[TransitionBlocked]) -> Value {
    Value::List(
        warnings
            .iter()
            .map(|w| Value::Str(w.to_string()))
            .collect(),
    )
}

fn observe_entries(scope: &Scope, name: &str) -> Result<Vec<ObserveEntry>, Fault> {
    let raw = match scope.get(name) {
        None | Some(Value::None) => return Ok(Vec::new()),
        Some(Value::List(items)) | Some(Value::Tuple(items)) => items.clone(),
        Some(Value::Str(single)) => return Ok(vec![ObserveEntry::Transition(single.clone())]),
        Some(other) => {
            return Err(Fault::Type(format!(
                "parameter '{name}' must be a list of connections, got {}",
                other.type_name()
            )));
        }
    };

    let mut entries = Vec::new();
    for item in raw {
        let entry = match item {
            Value::Str(transition) => ObserveEntry::Transition(transition),
            Value::List(parts) | Value::Tuple(parts) => {
                let strings: Result<Vec<String>, Fault> = parts
                    .iter()
                    .map(|p| match p {
                        Value::Str(s) => Ok(s.clone()),
                        other => Err(Fault::Type(format!(
                            "connection parts must be strings, got {}",
                            other.type_name()
                        ))),
                    })
                    .collect();
                let strings = strings?;
                match strings.len() {
                    2 => ObserveEntry::ToDecision(strings[0].clone(), strings[1].clone()),
                    3 => ObserveEntry::WithReciprocal(
                        strings[0].clone(),
                        strings[1].clone(),
                        strings[2].clone(),
                    ),
                    n => {
                        return Err(Fault::Value(format!(
                            "a connection needs 2 or 3 parts, got {n}"
                        )));
                    }
                }
            }
            other => {
                return Err(Fault::Type(format!(
                    "each connection must be a name or a pair/triple, got {}",
                    other.type_name()
                )));
            }
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// Call a graph method by name with arguments drawn from the scope.
pub fn dispatch_graph(
    graph: &mut DecisionGraph,
    function: &str,
    scope: &Scope,
) -> Result<Value, Fault> {
    match function {
        "add_decision" => {
            let name = required_str(scope, "name")?;
            graph.add_decision(name).map_err(graph_fault)?;
            Ok(Value::None)
        }
        "add_transition" => {
            let from = required_str(scope, "from_decision")?;
            let name = required_str(scope, "name")?;
            let to = required_str(scope, "to_decision")?;
            let rev_name = optional_str(scope, "rev_name")?;
            graph
                .add_transition(&from, name, &to, rev_name.as_deref())
                .map_err(graph_fault)?;
            Ok(Value::None)
        }
        "remove_transition" => {
            let from = required_str(scope, "from_decision")?;
            let transition = required_str(scope, "transition")?;
            let remove_reciprocal = flag(scope, "remove_reciprocal", false)?;
            graph
                .remove_transition(&from, &transition, remove_reciprocal)
                .map_err(graph_fault)?;
            Ok(Value::None)
        }
        "add_unexplored_edge" => {
            let from = required_str(scope, "from_decision")?;
            let name = required_str(scope, "name")?;
            let destination_name = optional_str(scope, "destination_name")?;
            let reciprocal = optional_str(scope, "reciprocal")?;
            let created = graph
                .add_unexplored_edge_with(
                    &from,
                    name,
                    destination_name.as_deref(),
                    reciprocal.as_deref().or(Some("return")),
                    Default::default(),
                    Default::default(),
                )
                .map_err(graph_fault)?;
            Ok(Value::Str(created))
        }
        "replace_unexplored" => {
            let from = required_str(scope, "from_decision")?;
            let transition = required_str(scope, "transition")?;
            let connect_to = optional_str(scope, "connect_to")?;
            let rev_name = optional_str(scope, "rev_name")?;
            let renames = graph
                .replace_unexplored(
                    &from,
                    &transition,
                    connect_to.as_deref(),
                    rev_name.as_deref(),
                )
                .map_err(graph_fault)?;
            Ok(Value::Tuple(vec![
                rename_map_value(&renames.at_destination),
                rename_map_value(&renames.at_source),
            ]))
        }
        "merge_decisions" => {
            let merge = required_str(scope, "merge")?;
            let merge_into = required_str(scope, "merge_into")?;
            let error_on_collision = flag(scope, "error_on_name_collision", true)?;
            let renames = graph
                .merge_decisions(&merge, &merge_into, error_on_collision)
                .map_err(graph_fault)?;
            Ok(rename_map_value(&renames))
        }
        "rename_decision" => {
            let decision = required_str(scope, "decision")?;
            let new_name = required_str(scope, "new_name")?;
            let renames = graph
                .rename_decision(&decision, &new_name)
                .map_err(graph_fault)?;
            Ok(rename_map_value(&renames))
        }
        "retarget_transition" => {
            let from = required_str(scope, "from_decision")?;
            let transition = required_str(scope, "transition")?;
            let new_destination = required_str(scope, "new_destination")?;
            let swap = flag(scope, "swap_reciprocal", true)?;
            let error_on_collision = flag(scope, "error_on_name_collision", true)?;
            let reciprocal = graph
                .retarget_transition(&from, &transition, &new_destination, swap, error_on_collision)
                .map_err(graph_fault)?;
            Ok(reciprocal.map(Value::Str).unwrap_or(Value::None))
        }
        "rebase_transition" => {
            let from = required_str(scope, "from_decision")?;
            let transition = required_str(scope, "transition")?;
            let new_base = required_str(scope, "new_base")?;
            let swap = flag(scope, "swap_reciprocal", true)?;
            let error_on_collision = flag(scope, "error_on_name_collision", true)?;
            let new_name = graph
                .rebase_transition(&from, &transition, &new_base, swap, error_on_collision)
                .map_err(graph_fault)?;
            Ok(Value::Str(new_name))
        }
        "merge_transitions" => {
            let from = required_str(scope, "from_decision")?;
            let merge = required_str(scope, "merge")?;
            let merge_into = required_str(scope, "merge_into")?;
            let merge_reciprocal = flag(scope, "merge_reciprocal", true)?;
            graph
                .merge_transitions(&from, &merge, &merge_into, merge_reciprocal)
                .map_err(graph_fault)?;
            Ok(Value::None)
        }
        "set_reciprocal" => {
            let decision = required_str(scope, "decision")?;
            let transition = required_str(scope, "transition")?;
            let reciprocal = optional_str(scope, "reciprocal")?;
            graph
                .set_reciprocal(&decision, &transition, reciprocal.as_deref())
                .map_err(graph_fault)?;
            Ok(Value::None)
        }
        "get_reciprocal" => {
            let decision = required_str(scope, "decision")?;
            let transition = required_str(scope, "transition")?;
            Ok(graph
                .get_reciprocal(&decision, &transition)
                .map(Value::Str)
                .unwrap_or(Value::None))
        }
        "destination" => {
            let decision = required_str(scope, "decision")?;
            let transition = required_str(scope, "transition")?;
            graph
                .destination(&decision, &transition)
                .map(Value::Str)
                .map_err(graph_fault)
        }
        "get_destination" => {
            let decision = required_str(scope, "decision")?;
            let transition = required_str(scope, "transition")?;
            Ok(graph
                .get_destination(&decision, &transition)
                .map(Value::Str)
                .unwrap_or(Value::None))
        }
        "add_action" => {
            let decision = required_str(scope, "decision")?;
            let action = required_str(scope, "action")?;
            let requirement = optional_requirement(scope, "requires")?;
            graph
                .add_action(&decision, action, requirement, None)
                .map_err(graph_fault)?;
            Ok(Value::None)
        }
        "set_transition_requirement" => {
            let decision = required_str(scope, "decision")?;
            let transition = required_str(scope, "transition")?;
            let requirement = optional_requirement(scope, "requires")?.unwrap_or_default();
            graph
                .set_transition_requirement(&decision, &transition, requirement)
                .map_err(graph_fault)?;
            Ok(Value::None)
        }
        "is_unknown" => {
            let decision = required_str(scope, "decision")?;
            graph
                .is_unknown(&decision)
                .map(Value::Bool)
                .map_err(graph_fault)
        }
        "tag_decision" => {
            let decision = required_str(scope, "decision")?;
            let tag = required_str(scope, "tag")?;
            graph.tag_decision(&decision, tag).map_err(graph_fault)?;
            Ok(Value::None)
        }
        "untag_decision" => {
            let decision = required_str(scope, "decision")?;
            let tag = required_str(scope, "tag")?;
            graph
                .untag_decision(&decision, &tag)
                .map(Value::Bool)
                .map_err(graph_fault)
        }
        "annotate_decision" => {
            let decision = required_str(scope, "decision")?;
            let annotation = required_str(scope, "annotation")?;
            graph
                .annotate_decision(&decision, annotation)
                .map_err(graph_fault)?;
            Ok(Value::None)
        }
        "tag_transition" => {
            let decision = required_str(scope, "decision")?;
            let transition = required_str(scope, "transition")?;
            let tag = required_str(scope, "tag")?;
            graph
                .tag_transition(&decision, &transition, tag)
                .map_err(graph_fault)?;
            Ok(Value::None)
        }
        "annotate_transition" => {
            let decision = required_str(scope, "decision")?;
            let transition = required_str(scope, "transition")?;
            let annotation = required_str(scope, "annotation")?;
            graph
                .annotate_transition(&decision, &transition, annotation)
                .map_err(graph_fault)?;
            Ok(Value::None)
        }
        "create_zone" => {
            let zone = required_str(scope, "zone")?;
            let level = required_int(scope, "level")?;
            let level = u32::try_from(level)
                .map_err(|_| Fault::Value(format!("invalid zone level {level}")))?;
            graph.create_zone(zone, level).map_err(graph_fault)?;
            Ok(Value::None)
        }
        "add_decision_to_zone" => {
            let decision = required_str(scope, "decision")?;
            let zone = required_str(scope, "zone")?;
            graph
                .add_decision_to_zone(&decision, &zone)
                .map_err(graph_fault)?;
            Ok(Value::None)
        }
        "add_zone_to_zone" => {
            let add_it = required_str(scope, "add_it")?;
            let add_to = required_str(scope, "add_to")?;
            graph.add_zone_to_zone(&add_it, &add_to).map_err(graph_fault)?;
            Ok(Value::None)
        }
        "add_ending" => {
            let from = required_str(scope, "from_decision")?;
            let name = required_str(scope, "name")?;
            graph
                .add_ending(&from, &name)
                .map(Value::Str)
                .map_err(graph_fault)
        }
        other => Err(Fault::Key(format!("no graph method named '{other}'"))),
    }
}

/// Call an exploration method by name with arguments drawn from the
/// scope.
pub fn dispatch_exploration(
    exploration: &mut Exploration,
    function: &str,
    scope: &mut Scope,
) -> Result<Value, Fault> {
    match function {
        "observe" => {
            let entries = observe_entries(scope, "transitions")?;
            let at = optional_str(scope, "at")?;
            exploration
                .observe(&entries, at.as_deref())
                .map_err(explore_fault)?;
            Ok(Value::None)
        }
        "explore" => {
            let transition = required_str(scope, "transition")?;
            let destination = required_str(scope, "destination")?;
            let connections = observe_entries(scope, "connections")?;
            let reciprocal = optional_str(scope, "reciprocal")?;
            let zone = zone_placement(scope, "zone")?;
            let warnings = exploration
                .explore(&transition, &destination, &connections, reciprocal.as_deref(), zone)
                .map_err(explore_fault)?;
            Ok(warnings_value(&warnings))
        }
        "return_to" => {
            let transition = required_str(scope, "transition")?;
            let destination = required_str(scope, "destination")?;
            let reciprocal = optional_str(scope, "reciprocal")?;
            let warnings = exploration
                .return_to(&transition, &destination, reciprocal.as_deref())
                .map_err(explore_fault)?;
            Ok(warnings_value(&warnings))
        }
        "retrace" => {
            let transition = required_str(scope, "transition")?;
            let warnings = exploration.retrace(&transition).map_err(explore_fault)?;
            Ok(warnings_value(&warnings))
        }
        "take_action" => {
            let action = required_str(scope, "action")?;
            let requirement = optional_requirement(scope, "requires")?;
            let warnings = exploration
                .take_action(&action, requirement, None)
                .map_err(explore_fault)?;
            Ok(warnings_value(&warnings))
        }
        "warp" => {
            let destination = required_str(scope, "destination")?;
            let message = optional_str(scope, "message")?.unwrap_or_default();
            let zone = zone_placement(scope, "zone")?;
            exploration
                .warp(&destination, &message, None, zone)
                .map_err(explore_fault)?;
            Ok(Value::None)
        }
        "wait" => {
            let message = optional_str(scope, "message")?.unwrap_or_default();
            exploration.wait(&message, None).map_err(explore_fault)?;
            Ok(Value::None)
        }
        "re_zone" => {
            let zone = required_str(scope, "zone")?;
            let target = match scope.get("replace") {
                None => ReZoneTarget::Level(0),
                Some(Value::Int(level)) => {
                    let level = u32::try_from(*level)
                        .map_err(|_| Fault::Value(format!("invalid zone level {level}")))?;
                    ReZoneTarget::Level(level)
                }
                Some(Value::Str(of)) => ReZoneTarget::OfZone(of.clone()),
                Some(other) => {
                    return Err(Fault::Type(format!(
                        "parameter 'replace' must be a level or a zone name, got {}",
                        other.type_name()
                    )));
                }
            };
            let at = optional_str(scope, "at")?;
            exploration
                .re_zone(&zone, target, at.as_deref())
                .map_err(explore_fault)?;
            Ok(Value::None)
        }
        "current_position" => exploration
            .current_position()
            .map(|p| Value::Str(p.clone()))
            .map_err(explore_fault),
        "step_count" => Ok(Value::Int(exploration.len() as i64)),
        "has_power_now" => {
            let power = required_str(scope, "power")?;
            Ok(Value::Bool(exploration.has_power_now(&power)))
        }
        "gain_power_now" => {
            let power = required_str(scope, "power")?;
            exploration.gain_power_now(power).map_err(explore_fault)?;
            Ok(Value::None)
        }
        "lose_power_now" => {
            let power = required_str(scope, "power")?;
            exploration.lose_power_now(&power).map_err(explore_fault)?;
            Ok(Value::None)
        }
        "token_count_now" => {
            let token = required_str(scope, "token_type")?;
            Ok(exploration
                .token_count_now(&token)
                .map(Value::Int)
                .unwrap_or(Value::None))
        }
        "adjust_tokens_now" => {
            let token = required_str(scope, "token_type")?;
            let amount = required_int(scope, "amount")?;
            exploration
                .adjust_tokens_now(token, amount)
                .map_err(explore_fault)?;
            Ok(Value::None)
        }
        "set_tokens_now" => {
            let token = required_str(scope, "token_type")?;
            let amount = required_int(scope, "amount")?;
            exploration
                .set_tokens_now(token, amount)
                .map_err(explore_fault)?;
            Ok(Value::None)
        }
        "update_requirement_now" => {
            let decision = required_str(scope, "decision")?;
            let transition = required_str(scope, "transition")?;
            let requirement = optional_requirement(scope, "requires")?;
            exploration
                .update_requirement_now(&decision, &transition, requirement)
                .map_err(explore_fault)?;
            Ok(Value::None)
        }
        "tag_step" => {
            let tag = required_str(scope, "tag")?;
            exploration.tag_step(tag, None).map_err(explore_fault)?;
            Ok(Value::None)
        }
        "annotate_step" => {
            let annotation = required_str(scope, "annotation")?;
            exploration
                .annotate_step(annotation, None)
                .map_err(explore_fault)?;
            Ok(Value::None)
        }
        other => Err(Fault::Key(format!("no exploration method named '{other}'"))),
    }
}
