//! Structural, conflict-preserving merge of JSON documents.

use serde_json::Value;

/// Recursively merge `other` into `subject`.
///
/// For each key of `other` that is not in `exclude`:
/// - absent from `subject`: the value is copied over as is;
/// - a map on both sides: the two maps are merged recursively;
/// - anything else: `subject` keeps its value.
///
/// Nothing already present in `subject` is ever overwritten, and sequences
/// are never concatenated. `exclude` applies to the top level only. Merging
/// into or from a non-map value is a no-op.
pub fn deep_merge(subject: &mut Value, other: &Value, exclude: &[&str]) {
    let (Value::Object(subject), Value::Object(other)) = (subject, other) else {
        return;
    };

    for (key, value) in other {
        if exclude.contains(&key.as_str()) {
            continue;
        }
        match subject.get_mut(key) {
            None => {
                subject.insert(key.clone(), value.clone());
            }
            Some(existing) => {
                if existing.is_object() && value.is_object() {
                    deep_merge(existing, value, &[]);
                }
            }
        }
    }
}
