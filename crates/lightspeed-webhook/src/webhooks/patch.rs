//! Computes the JSON patch answering a mutating admission request.
//!
//! The API server applies the patch to the object exactly as it was submitted. A typed resource
//! can serialize differently from that, for example fields defaulted during decoding show up as
//! `{}` or `[]`. Therefore the changes between the typed original and the typed defaulted object
//! are replayed onto the submitted JSON first, and the patch is computed from that result.
use json_patch::{AddOperation, Patch, PatchOperation, RemoveOperation, ReplaceOperation};
use serde_json::{Map, Value};

/// Returns the patch transforming `submitted` into `submitted` plus the changes between
/// `original` and `defaulted`.
///
/// Parents missing in `submitted` are created, fields not known to the typed resource are kept.
pub(crate) fn defaulting_patch(submitted: &Value, original: &Value, defaulted: &Value) -> Patch {
    let mut target = submitted.clone();

    for operation in json_patch::diff(original, defaulted).0 {
        let applied = match operation {
            PatchOperation::Add(AddOperation { path, value }) => {
                set(&mut target, defaulted, path.as_str(), value, true)
            }
            PatchOperation::Replace(ReplaceOperation { path, value }) => {
                set(&mut target, defaulted, path.as_str(), value, false)
            }
            PatchOperation::Remove(RemoveOperation { path }) => remove(&mut target, path.as_str()),
            // diff only emits add, remove and replace operations
            _ => Some(()),
        };

        if applied.is_none() {
            tracing::debug!("change does not apply to the submitted object, skipping it");
        }
    }

    json_patch::diff(submitted, &target)
}

/// Sets `value` at `path`, creating missing parents with the container type they have in
/// `defaulted`. Array elements are inserted if `insert` is set and replaced otherwise.
fn set(target: &mut Value, defaulted: &Value, path: &str, value: Value, insert: bool) -> Option<()> {
    let tokens: Vec<String> = path.split('/').skip(1).map(unescape).collect();
    let Some((last, parents)) = tokens.split_last() else {
        *target = value;
        return Some(());
    };

    let mut current = target;
    let mut shape = Some(defaulted);
    for token in parents {
        shape = shape.and_then(|shape| child(shape, token));

        current = match current {
            Value::Object(map) => {
                let entry = map.entry(token.clone()).or_insert(Value::Null);
                if entry.is_null() {
                    *entry = match shape {
                        Some(Value::Array(_)) => Value::Array(Vec::new()),
                        _ => Value::Object(Map::new()),
                    };
                }
                entry
            }
            Value::Array(items) => items.get_mut(token.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
        }
        Value::Array(items) if last == "-" => items.push(value),
        Value::Array(items) => {
            let index = last.parse::<usize>().ok()?;
            if insert && index <= items.len() {
                items.insert(index, value);
            } else {
                *items.get_mut(index)? = value;
            }
        }
        _ => return None,
    }

    Some(())
}

fn remove(target: &mut Value, path: &str) -> Option<()> {
    let (parent, last) = path.rsplit_once('/')?;
    let last = unescape(last);

    match target.pointer_mut(parent)? {
        Value::Object(map) => map.remove(&last).map(|_| ()),
        Value::Array(items) => {
            let index = last.parse::<usize>().ok().filter(|index| *index < items.len())?;
            items.remove(index);
            Some(())
        }
        _ => None,
    }
}

fn child<'a>(value: &'a Value, token: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(token),
        Value::Array(items) => items.get(token.parse::<usize>().ok()?),
        _ => None,
    }
}

/// Decodes a single JSON pointer reference token (RFC 6901).
fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn apply(submitted: &Value, patch: &Patch) -> Value {
        let mut patched = submitted.clone();
        json_patch::patch(&mut patched, patch).expect("patch must apply to the submitted object");
        patched
    }

    #[test]
    fn missing_parent_is_created() {
        let submitted = json!({ "spec": { "llm": { "providers": [] } } });
        // The typed resource defaults the missing `ols` block to an empty object.
        let original = json!({ "spec": { "llm": { "providers": [] }, "ols": {} } });
        let defaulted = json!({
            "spec": {
                "llm": { "providers": [] },
                "ols": { "byokRAGOnly": true, "rag": [{ "image": "quay.io/rag:latest" }] }
            }
        });

        let patch = defaulting_patch(&submitted, &original, &defaulted);

        assert_eq!(
            serde_json::to_value(&patch).expect("patch must serialize"),
            json!([{
                "op": "add",
                "path": "/spec/ols",
                "value": { "byokRAGOnly": true, "rag": [{ "image": "quay.io/rag:latest" }] }
            }])
        );
        assert_eq!(
            apply(&submitted, &patch),
            json!({
                "spec": {
                    "llm": { "providers": [] },
                    "ols": { "byokRAGOnly": true, "rag": [{ "image": "quay.io/rag:latest" }] }
                }
            })
        );
    }

    #[test]
    fn unknown_fields_are_kept() {
        let submitted = json!({
            "spec": { "ols": { "querySystemPrompt": "custom", "futureField": { "enabled": true } } }
        });
        let original = json!({ "spec": { "ols": { "querySystemPrompt": "custom" } } });
        let defaulted = json!({ "spec": { "ols": { "querySystemPrompt": "defaulted" } } });

        let patch = defaulting_patch(&submitted, &original, &defaulted);

        assert_eq!(
            apply(&submitted, &patch),
            json!({
                "spec": {
                    "ols": { "querySystemPrompt": "defaulted", "futureField": { "enabled": true } }
                }
            })
        );
    }

    #[rstest]
    #[case::insert(json!(["a", "c"]), json!(["a", "b", "c"]))]
    #[case::append(json!(["a"]), json!(["a", "b"]))]
    #[case::replace(json!(["a", "b"]), json!(["a", "c"]))]
    #[case::remove(json!(["a", "b", "c"]), json!(["a"]))]
    fn array_changes(#[case] before: Value, #[case] after: Value) {
        let submitted = json!({ "items": before, "extra": 1 });
        let original = json!({ "items": before });
        let defaulted = json!({ "items": after });

        let patch = defaulting_patch(&submitted, &original, &defaulted);

        assert_eq!(apply(&submitted, &patch), json!({ "items": after, "extra": 1 }));
    }

    #[test]
    fn escaped_keys() {
        let submitted = json!({ "metadata": {} });
        let original = json!({ "metadata": { "annotations": {} } });
        let defaulted = json!({ "metadata": { "annotations": { "example.com/enabled": "true" } } });

        let patch = defaulting_patch(&submitted, &original, &defaulted);

        assert_eq!(
            apply(&submitted, &patch),
            json!({ "metadata": { "annotations": { "example.com/enabled": "true" } } })
        );
    }

    #[test]
    fn unchanged_object_has_empty_patch() {
        let submitted = json!({ "spec": { "unknown": "kept" } });
        let original = json!({ "spec": { "ols": {} } });

        let patch = defaulting_patch(&submitted, &original, &original);

        assert!(patch.0.is_empty());
    }
}
