//! In-place edits of cached JSON documents.
//!
//! Three list shapes are understood:
//! - a bare array of records
//! - a page object whose records live under `results`
//! - an infinite list whose `pages` are arrays or page objects
//!
//! Page objects may carry a `count` member holding the server-side total,
//! which inserts and removes keep in step. Anything else is not a list and
//! every list edit on it is a no-op.

use fitsync_protocol::EntityId;
use serde_json::{Map, Value};

/// Where an inserted record goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPosition {
    /// Before every other record (first page for infinite lists).
    Head,
    /// After every other record (last page for infinite lists).
    Tail,
}

const RESULTS: &str = "results";
const PAGES: &str = "pages";
const COUNT: &str = "count";

fn page_records(page: &mut Value) -> Option<&mut Vec<Value>> {
    match page {
        Value::Array(items) => Some(items),
        Value::Object(obj) => match obj.get_mut(RESULTS) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn record_lists(doc: &mut Value) -> Vec<&mut Vec<Value>> {
    match doc {
        Value::Array(items) => vec![items],
        Value::Object(obj) => {
            if obj.contains_key(RESULTS) {
                match obj.get_mut(RESULTS) {
                    Some(Value::Array(items)) => vec![items],
                    _ => Vec::new(),
                }
            } else {
                match obj.get_mut(PAGES) {
                    Some(Value::Array(pages)) => pages.iter_mut().filter_map(page_records).collect(),
                    _ => Vec::new(),
                }
            }
        }
        _ => Vec::new(),
    }
}

fn record_slices(doc: &Value) -> Vec<&[Value]> {
    fn page(page: &Value) -> Option<&[Value]> {
        match page {
            Value::Array(items) => Some(items),
            Value::Object(obj) => obj.get(RESULTS).and_then(Value::as_array).map(Vec::as_slice),
            _ => None,
        }
    }
    match doc {
        Value::Array(items) => vec![items.as_slice()],
        Value::Object(obj) if obj.contains_key(RESULTS) => page(doc).into_iter().collect(),
        Value::Object(obj) => match obj.get(PAGES) {
            Some(Value::Array(pages)) => pages.iter().filter_map(page).collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Returns true if the document has one of the list shapes.
pub fn is_list(doc: &Value) -> bool {
    match doc {
        Value::Array(_) => true,
        Value::Object(obj) => {
            matches!(obj.get(RESULTS), Some(Value::Array(_)))
                || matches!(obj.get(PAGES), Some(Value::Array(_)))
        }
        _ => false,
    }
}

fn shift_count(obj: &mut Map<String, Value>, delta: i64) {
    if let Some(Value::Number(n)) = obj.get(COUNT) {
        if let Some(current) = n.as_i64() {
            obj.insert(
                COUNT.to_string(),
                Value::from(current.saturating_add(delta).max(0)),
            );
        }
    }
}

fn shift_counts(doc: &mut Value, delta: i64) {
    let Value::Object(obj) = doc else {
        return;
    };
    shift_count(obj, delta);
    if let Some(Value::Array(pages)) = obj.get_mut(PAGES) {
        for page in pages {
            if let Value::Object(page) = page {
                shift_count(page, delta);
            }
        }
    }
}

/// Inserts a record, or replaces it in place if its id is already listed.
pub fn insert(doc: &mut Value, record: &Value, position: ListPosition) -> bool {
    let Some(id) = EntityId::of_record(record) else {
        return false;
    };
    if replace(doc, &id, record) {
        return true;
    }
    let mut lists = record_lists(doc);
    let target = match position {
        ListPosition::Head => lists.first_mut(),
        ListPosition::Tail => lists.last_mut(),
    };
    let Some(items) = target else {
        return false;
    };
    match position {
        ListPosition::Head => items.insert(0, record.clone()),
        ListPosition::Tail => items.push(record.clone()),
    }
    shift_counts(doc, 1);
    true
}

/// Replaces every listed record with the given id.
pub fn replace(doc: &mut Value, id: &EntityId, record: &Value) -> bool {
    let mut replaced = false;
    for items in record_lists(doc) {
        for item in items.iter_mut().filter(|item| has_id(item, id)) {
            *item = record.clone();
            replaced = true;
        }
    }
    replaced
}

/// Removes every listed record with the given id.
pub fn remove(doc: &mut Value, id: &EntityId) -> bool {
    let mut removed = 0usize;
    for items in record_lists(doc) {
        let before = items.len();
        items.retain(|item| !has_id(item, id));
        removed += before - items.len();
    }
    if removed == 0 {
        return false;
    }
    shift_counts(doc, -i64::try_from(removed).unwrap_or(i64::MAX));
    true
}

/// Finds a record by id in a list, or the document itself if it is the record.
pub fn find<'a>(doc: &'a Value, id: &EntityId) -> Option<&'a Value> {
    if has_id(doc, id) {
        return Some(doc);
    }
    record_slices(doc)
        .into_iter()
        .flat_map(|items| items.iter())
        .find(|item| has_id(item, id))
}

/// Every record held by a document: the list members, or the document itself.
pub fn records(doc: &Value) -> Vec<&Value> {
    if is_list(doc) {
        record_slices(doc)
            .into_iter()
            .flat_map(|items| items.iter())
            .collect()
    } else if doc.is_object() {
        vec![doc]
    } else {
        Vec::new()
    }
}

/// Adds `delta` to the integer at `path`, clamping at zero.
///
/// A missing member counts as zero and missing intermediate objects are
/// created. A path through a non-object or onto a non-integer is a no-op.
pub fn adjust_counter(doc: &mut Value, path: &[String], delta: i64) -> bool {
    let Some((field, parents)) = path.split_last() else {
        return false;
    };
    let mut node = doc;
    for name in parents {
        let Value::Object(obj) = node else {
            return false;
        };
        node = obj
            .entry(name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let Value::Object(obj) = node else {
        return false;
    };
    let current = match obj.get(field) {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(v) => v,
            None => return false,
        },
        Some(_) => return false,
    };
    obj.insert(
        field.clone(),
        Value::from(current.saturating_add(delta).max(0)),
    );
    true
}

fn has_id(record: &Value, id: &EntityId) -> bool {
    record.get("id").is_some_and(|v| id.matches_json(v))
}
