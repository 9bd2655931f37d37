//! Post-parse reference resolution.
//!
//! Every `N M R` placeholder whose target was registered is replaced by a
//! direct arena link. Resolution only substitutes; it never traverses, so
//! cyclic graphs (page `/Parent` back-pointers) are handled for free.
//! Missing targets stay as placeholders and are reported once each.

use std::collections::{BTreeSet, HashMap};

use log::warn;

use crate::core::{Dict, NodeId, Object};

pub(crate) fn resolve_references(
    nodes: &mut [Object],
    trailer: &mut Dict,
    registry: &HashMap<(u32, u16), NodeId>,
) {
    let mut missing: BTreeSet<(u32, u16)> = BTreeSet::new();
    for node in nodes.iter_mut() {
        patch(node, registry, &mut missing);
    }
    for (_, value) in trailer.iter_mut() {
        patch(value, registry, &mut missing);
    }
    for (id, generation) in missing {
        warn!("unresolved reference {id} {generation} R kept as placeholder");
    }
}

fn patch(
    value: &mut Object,
    registry: &HashMap<(u32, u16), NodeId>,
    missing: &mut BTreeSet<(u32, u16)>,
) {
    match value {
        Object::Reference(r) => match registry.get(&(r.id, r.generation)) {
            Some(node) => *value = Object::Link(*node),
            None => {
                missing.insert((r.id, r.generation));
            }
        },
        Object::Array(items) => {
            for item in items {
                patch(item, registry, missing);
            }
        }
        Object::Dictionary(dict) => {
            for (_, v) in dict.iter_mut() {
                patch(v, registry, missing);
            }
        }
        Object::Stream(stream) => {
            for (_, v) in stream.dict.iter_mut() {
                patch(v, registry, missing);
            }
        }
        _ => {}
    }
}
