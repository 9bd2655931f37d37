//! Indirect-object enumeration.
//!
//! Decides which nodes appear as numbered objects in the output, in a
//! stable order: fixed-role seeds first, then values shared between two or
//! more parents, then everything the key-pattern rules force indirect.
//! Inline values selected by a rule are promoted into the arena so the
//! writer can reference them. Output ids are assigned by list position;
//! id 0 stays reserved for the free-list head.

use std::collections::{HashMap, HashSet};
use std::mem;

use crate::core::{Dict, Document, Name, NodeId, Object};

/// Keys whose dictionary values are always indirect.
const DICT_VALUE_KEYS: &[&[u8]] = &[
    b"AN",
    b"Annotation",
    b"B",
    b"C",
    b"CI",
    b"DocMDP",
    b"F",
    b"FontDescriptor",
    b"I",
    b"IX",
    b"K",
    b"Lock",
    b"N",
    b"P",
    b"Pg",
    b"RI",
    b"SE",
    b"SV",
    b"V",
];

/// Keys whose values are always indirect, whatever they are.
const ANY_VALUE_KEYS: &[&[u8]] = &[
    b"Data",
    b"First",
    b"ID",
    b"Last",
    b"Next",
    b"Obj",
    b"Parent",
    b"ParentTree",
    b"Popup",
    b"Prev",
    b"Root",
    b"StmOwn",
    b"Threads",
    b"Widths",
];

/// Keys whose array's dictionary elements are each indirect.
const ARRAY_ELEMENT_KEYS: &[&[u8]] = &[
    b"Annots",
    b"B",
    b"C",
    b"CO",
    b"Fields",
    b"K",
    b"Kids",
    b"O",
    b"Pages",
    b"TrapRegions",
];

/// Catalog entries seeded as indirect objects, in emission order.
const SEED_KEYS: &[&[u8]] = &[
    b"Dests",
    b"Metadata",
    b"Outlines",
    b"Pages",
    b"Threads",
    b"StructTreeRoot",
];

pub(crate) struct Enumeration {
    /// Nodes in output order; position `i` serializes as object `i + 1`.
    pub order: Vec<NodeId>,
    ids: HashMap<NodeId, u32>,
}

impl Enumeration {
    fn new() -> Self {
        Enumeration {
            order: Vec::new(),
            ids: HashMap::new(),
        }
    }

    /// Append a node unless it is already listed.
    fn push(&mut self, node: NodeId) {
        if let std::collections::hash_map::Entry::Vacant(slot) = self.ids.entry(node) {
            self.order.push(node);
            slot.insert(self.order.len() as u32);
        }
    }

    pub(crate) fn id_of(&self, node: NodeId) -> Option<u32> {
        self.ids.get(&node).copied()
    }

    pub(crate) fn contains(&self, node: NodeId) -> bool {
        self.ids.contains_key(&node)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

pub(crate) fn enumerate(doc: &mut Document) -> Enumeration {
    let mut e = Enumeration::new();
    seed(doc, &mut e);
    promote_shared(doc, &mut e);
    apply_rules(doc, &mut e);
    e
}

/// Step 1: fixed-role nodes, in their fixed order.
fn seed(doc: &mut Document, e: &mut Enumeration) {
    promote_trailer_entry(doc, b"Root", e);
    promote_trailer_entry(doc, b"Info", e);

    let Some(root) = doc.root() else { return };
    for key in SEED_KEYS {
        promote_entry_of_node(doc, root, key, e);
    }
    seed_ocgs(doc, root, e);
}

fn promote_trailer_entry(doc: &mut Document, key: &[u8], e: &mut Enumeration) {
    match doc.trailer.get(key) {
        Some(Object::Link(n)) => {
            let n = *n;
            e.push(n);
        }
        Some(v) if v.is_composite() => {
            let taken = match doc.trailer.get_mut(key) {
                Some(slot) => mem::replace(slot, Object::Null),
                None => return,
            };
            let node = doc.insert(taken);
            doc.trailer.insert(Name::from(key), Object::Link(node));
            e.push(node);
        }
        _ => {}
    }
}

fn promote_entry_of_node(doc: &mut Document, owner: NodeId, key: &[u8], e: &mut Enumeration) {
    enum Action {
        Push(NodeId),
        Promote,
        Nothing,
    }
    let action = match doc.node(owner).as_dict().and_then(|d| d.get(key)) {
        Some(Object::Link(n)) => Action::Push(*n),
        Some(v) if v.is_composite() => Action::Promote,
        _ => Action::Nothing,
    };
    match action {
        Action::Push(n) => e.push(n),
        Action::Promote => {
            let taken = doc
                .node_mut(owner)
                .as_dict_mut()
                .and_then(|d| d.get_mut(key))
                .map(|slot| mem::replace(slot, Object::Null));
            if let Some(taken) = taken {
                let node = doc.insert(taken);
                if let Some(d) = doc.node_mut(owner).as_dict_mut() {
                    d.insert(Name::from(key), Object::Link(node));
                }
                e.push(node);
            }
        }
        Action::Nothing => {}
    }
}

/// Each element of `Root/OCProperties/OCGs`, wherever the pieces of that
/// path live (inline under the catalog or behind links).
fn seed_ocgs(doc: &mut Document, root: NodeId, e: &mut Enumeration) {
    let mut owner = root;
    let mut path: Vec<&[u8]> = Vec::new();
    for key in [&b"OCProperties"[..], b"OCGs"] {
        let value = match navigate_ref(doc.node(owner), &path) {
            Some(v) => v.as_dict().and_then(|d| d.get(key)),
            None => return,
        };
        match value {
            Some(Object::Link(n)) => {
                owner = *n;
                path.clear();
            }
            Some(_) => path.push(key),
            None => return,
        }
    }
    // The OCGs value itself may sit behind one more link.
    if let Some(Object::Link(n)) = navigate_ref(doc.node(owner), &path) {
        owner = *n;
        path.clear();
    }

    let elements = match navigate_ref(doc.node(owner), &path).and_then(Object::as_array) {
        Some(items) => items
            .iter()
            .map(|item| item.as_link())
            .collect::<Vec<Option<NodeId>>>(),
        None => return,
    };
    for (index, link) in elements.into_iter().enumerate() {
        match link {
            Some(n) => e.push(n),
            None => promote_indexed(doc, owner, &path, index, e),
        }
    }
}

fn navigate_ref<'a>(mut value: &'a Object, path: &[&[u8]]) -> Option<&'a Object> {
    for key in path {
        value = value.as_dict()?.get(key)?;
    }
    Some(value)
}

fn navigate_mut<'a>(mut value: &'a mut Object, path: &[&[u8]]) -> Option<&'a mut Object> {
    for key in path {
        value = value.as_dict_mut()?.get_mut(key)?;
    }
    Some(value)
}

/// Promote the composite at `owner`/`path`[`index`] into the arena.
fn promote_indexed(
    doc: &mut Document,
    owner: NodeId,
    path: &[&[u8]],
    index: usize,
    e: &mut Enumeration,
) {
    let mut obj = mem::replace(doc.node_mut(owner), Object::Null);
    let slot = navigate_mut(&mut obj, path)
        .and_then(Object::as_array_mut)
        .and_then(|items| items.get_mut(index));
    if let Some(slot) = slot {
        if slot.is_composite() {
            let taken = mem::replace(slot, Object::Null);
            let node = doc.insert(taken);
            *slot = Object::Link(node);
            e.push(node);
        } else if let Object::Link(n) = slot {
            e.push(*n);
        }
    }
    *doc.node_mut(owner) = obj;
}

/// Step 2: depth-first traversal from the trailer; any node reached twice
/// becomes indirect. This is what keeps shared subgraphs (and cycles)
/// from being emitted inline more than once.
fn promote_shared(doc: &Document, e: &mut Enumeration) {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<NodeId> = Vec::new();

    let mut visit = |n: NodeId, stack: &mut Vec<NodeId>, e: &mut Enumeration| {
        if seen.insert(n) {
            stack.push(n);
        } else {
            e.push(n);
        }
    };

    for (_, value) in doc.trailer.iter() {
        collect_links(value, &mut |n| visit(n, &mut stack, e));
    }
    while let Some(n) = stack.pop() {
        collect_links(doc.node(n), &mut |m| visit(m, &mut stack, e));
    }
}

fn collect_links(value: &Object, f: &mut impl FnMut(NodeId)) {
    match value {
        Object::Link(n) => f(*n),
        Object::Array(items) => {
            for item in items {
                collect_links(item, f);
            }
        }
        Object::Dictionary(dict) => {
            for (_, v) in dict.iter() {
                collect_links(v, f);
            }
        }
        Object::Stream(stream) => {
            for (_, v) in stream.dict.iter() {
                collect_links(v, f);
            }
        }
        _ => {}
    }
}

/// Step 3: iterate the growing indirect list, applying the key-pattern
/// promotion rules to every dictionary reachable in place.
fn apply_rules(doc: &mut Document, e: &mut Enumeration) {
    let mut i = 0;
    let mut walked: HashSet<NodeId> = HashSet::new();
    let mut queue: Vec<NodeId> = Vec::new();

    loop {
        let node = if i < e.order.len() {
            let n = e.order[i];
            i += 1;
            n
        } else if let Some(n) = queue.pop() {
            // Promoted since it was queued, or already walked inline.
            if e.contains(n) || !walked.insert(n) {
                continue;
            }
            n
        } else {
            break;
        };

        let mut obj = mem::replace(doc.node_mut(node), Object::Null);
        walk_value(doc, &mut obj, e, &mut queue);
        *doc.node_mut(node) = obj;
    }
}

fn walk_value(doc: &mut Document, value: &mut Object, e: &mut Enumeration, queue: &mut Vec<NodeId>) {
    match value {
        Object::Dictionary(dict) => walk_dict(doc, dict, e, queue),
        Object::Stream(stream) => walk_dict(doc, &mut stream.dict, e, queue),
        Object::Array(items) => {
            for item in items {
                walk_array_element(doc, item, e, queue);
            }
        }
        Object::Link(n) => {
            let n = *n;
            if !e.contains(n) {
                queue.push(n);
            }
        }
        _ => {}
    }
}

fn walk_array_element(
    doc: &mut Document,
    item: &mut Object,
    e: &mut Enumeration,
    queue: &mut Vec<NodeId>,
) {
    // Streams are indirect wherever they occur.
    if is_stream_like(doc, item) {
        promote_value(doc, item, e);
    } else {
        walk_value(doc, item, e, queue);
    }
}

fn walk_dict(doc: &mut Document, dict: &mut Dict, e: &mut Enumeration, queue: &mut Vec<NodeId>) {
    let type_name = dict
        .get(b"Type")
        .and_then(Object::as_name)
        .map(<[u8]>::to_vec);
    let s_name = dict.get(b"S").and_then(Object::as_name).map(<[u8]>::to_vec);
    let is_extgstate = type_name.as_deref() == Some(b"ExtGState");
    let is_thread = s_name.as_deref() == Some(b"Thread");
    let is_hide = s_name.as_deref() == Some(b"Hide");

    for (key, value) in dict.iter_mut() {
        let k = key.as_bytes();

        let must_promote = is_stream_like(doc, value)
            || (DICT_VALUE_KEYS.contains(&k) && is_dict_like(doc, value))
            || (ANY_VALUE_KEYS.contains(&k) && is_indirectable(value))
            || looks_indirect_dict(doc, value)
            || (is_thread && k == b"D")
            || (is_hide && k == b"T");
        if must_promote {
            promote_value(doc, value, e);
            continue;
        }

        if ARRAY_ELEMENT_KEYS.contains(&k) {
            match value {
                Object::Array(items) => {
                    for item in items {
                        if is_dict_like(doc, item) || is_stream_like(doc, item) {
                            promote_value(doc, item, e);
                        } else {
                            walk_value(doc, item, e, queue);
                        }
                    }
                }
                Object::Link(n) => {
                    let n = *n;
                    if !e.contains(n) {
                        promote_elements_of_linked_array(doc, n, e, queue);
                    }
                }
                _ => walk_value(doc, value, e, queue),
            }
            continue;
        }

        if is_extgstate && k == b"Font" {
            if let Object::Array(items) = value {
                for (index, item) in items.iter_mut().enumerate() {
                    if index == 0 && is_dict_like(doc, item) {
                        promote_value(doc, item, e);
                    } else {
                        walk_value(doc, item, e, queue);
                    }
                }
                continue;
            }
        }

        walk_value(doc, value, e, queue);
    }
}

/// Rule-c promotion when the array itself lives in the arena.
fn promote_elements_of_linked_array(
    doc: &mut Document,
    n: NodeId,
    e: &mut Enumeration,
    queue: &mut Vec<NodeId>,
) {
    let mut obj = mem::replace(doc.node_mut(n), Object::Null);
    if let Object::Array(items) = &mut obj {
        for item in items {
            if is_dict_like(doc, item) || is_stream_like(doc, item) {
                promote_value(doc, item, e);
            } else {
                walk_value(doc, item, e, queue);
            }
        }
    } else {
        walk_value(doc, &mut obj, e, queue);
    }
    *doc.node_mut(n) = obj;
}

/// Make a value indirect: links are listed, inline composites move into
/// the arena and leave a link behind. Scalars stay put.
fn promote_value(doc: &mut Document, value: &mut Object, e: &mut Enumeration) {
    match value {
        Object::Link(n) => {
            let n = *n;
            e.push(n);
        }
        v if v.is_composite() => {
            let taken = mem::replace(v, Object::Null);
            let node = doc.insert(taken);
            *v = Object::Link(node);
            e.push(node);
        }
        _ => {}
    }
}

fn is_stream_like(doc: &Document, value: &Object) -> bool {
    matches!(doc.resolve(value), Object::Stream(_))
}

fn is_dict_like(doc: &Document, value: &Object) -> bool {
    matches!(doc.resolve(value), Object::Dictionary(_))
}

fn is_indirectable(value: &Object) -> bool {
    value.is_composite() || matches!(value, Object::Link(_))
}

/// Dictionaries that are page-tree shaped or are file specs / fonts.
fn looks_indirect_dict(doc: &Document, value: &Object) -> bool {
    match doc.resolve(value) {
        Object::Dictionary(d) => {
            let type_name = d.get(b"Type").and_then(Object::as_name);
            d.contains_key(b"Kids")
                || type_name == Some(b"Filespec")
                || type_name == Some(b"Font")
        }
        _ => false,
    }
}
