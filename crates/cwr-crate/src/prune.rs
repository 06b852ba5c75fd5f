use std::collections::{HashMap, HashSet};

use cwr_types::{as_list, reference, string_or_reference, type_tags, ObjectId};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CrateError, CrateResult};

type Node = Map<String, Value>;

fn node_id(node: &Node) -> Option<&str> {
    node.get("@id").and_then(Value::as_str)
}

fn ids_of(node: &Node, key: &str) -> Vec<String> {
    node.get(key)
        .map(|v| {
            as_list(v)
                .into_iter()
                .filter_map(string_or_reference)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Reduce a flattened dataset graph to its workflow.
///
/// Every part of the root except the main entity is dropped (a child
/// dataset together with its own parts), and so are the provenance actions
/// the root mentions along with their inputs and outputs.
pub(crate) fn prune_for_workflow(nodes: &mut Vec<Node>, root: &ObjectId) -> CrateResult<()> {
    let index: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .filter_map(|(i, n)| node_id(n).map(|id| (id.to_string(), i)))
        .collect();
    let root_index = *index
        .get(root.as_str())
        .ok_or_else(|| CrateError::RootMissing(root.clone()))?;

    let workflow_id = nodes[root_index]
        .get("mainEntity")
        .and_then(string_or_reference)
        .map(str::to_string)
        .ok_or_else(|| CrateError::MissingMainEntity(root.clone()))?;

    let mut removed = HashSet::new();
    for part in ids_of(&nodes[root_index], "hasPart") {
        if part != workflow_id {
            remove_with_children(nodes, &index, &part, &mut removed);
        }
    }
    for mention in ids_of(&nodes[root_index], "mentions") {
        if let Some(&i) = index.get(&mention) {
            for related in ids_of(&nodes[i], "object")
                .into_iter()
                .chain(ids_of(&nodes[i], "result"))
            {
                removed.insert(related);
            }
        }
        removed.insert(mention);
    }
    removed.remove(&workflow_id);

    let root_node = &mut nodes[root_index];
    root_node.insert("hasPart".into(), Value::Array(vec![reference(&workflow_id)]));
    root_node.shift_remove("mentions");

    debug!(root = %root, workflow = %workflow_id, removed = removed.len(), "pruned graph to workflow");
    nodes.retain(|n| node_id(n).map_or(true, |id| !removed.contains(id)));
    for node in nodes.iter_mut() {
        node.retain(|key, value| key.starts_with('@') || unlink(value, &removed));
    }
    Ok(())
}

/// Drop links to pruned nodes from `value`. Returns false when the value is
/// itself such a link.
fn unlink(value: &mut Value, removed: &HashSet<String>) -> bool {
    match value {
        Value::Array(items) => {
            items.retain_mut(|item| unlink(item, removed));
            true
        }
        Value::Object(map) => map
            .get("@id")
            .and_then(Value::as_str)
            .map_or(true, |id| !removed.contains(id)),
        _ => true,
    }
}

fn remove_with_children(
    nodes: &[Node],
    index: &HashMap<String, usize>,
    id: &str,
    removed: &mut HashSet<String>,
) {
    if !removed.insert(id.to_string()) {
        return;
    }
    let Some(&i) = index.get(id) else {
        return;
    };
    if type_tags(nodes[i].get("@type")).iter().any(|t| t == "Dataset") {
        for child in ids_of(&nodes[i], "hasPart") {
            remove_with_children(nodes, index, &child, removed);
        }
    }
}
