use serde_json::{Map, Value};

/// One leaf that differs between two JSON documents, addressed by a
/// dot-separated path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Change {
    pub path: String,
    pub old: Value,
    pub new: Value,
}

/// Leaves of `current` that are new or differ from `previous`. Keys that
/// disappeared are not reported.
pub(crate) fn diff_json(previous: &Value, current: &Value) -> Vec<Change> {
    let mut changes = Vec::new();
    collect(previous, current, "", &mut changes);
    changes
}

fn collect(previous: &Value, current: &Value, prefix: &str, changes: &mut Vec<Change>) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => collect(prev_val, curr_val, &path, changes),
                    None if curr_val.is_object() => {
                        collect(&Value::Object(Map::new()), curr_val, &path, changes)
                    }
                    None => changes.push(Change {
                        path,
                        old: Value::Null,
                        new: curr_val.clone(),
                    }),
                }
            }
        }
        (prev, curr) if prev != curr => changes.push(Change {
            path: prefix.to_string(),
            old: prev.clone(),
            new: curr.clone(),
        }),
        _ => {}
    }
}
