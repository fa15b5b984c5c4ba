//! Field-by-field merging of configuration tiers.
//!
//! Tiers are merged as JSON values so a file only needs to mention the keys
//! it changes. Arrays are replaced, never concatenated.

use serde_json::Value;

/// Merge `overlay` onto `base`.
///
/// Objects merge key by key. Any other overlay value replaces the base value,
/// except `null`, which means "not specified" and keeps the base.
///
/// # Example
/// ```
/// use serde_json::json;
/// use taskboard_sync::config::deep_merge;
///
/// let defaults = json!({"store": {"schema": "public", "realtime": true}});
/// let project = json!({"store": {"realtime": false}});
/// assert_eq!(
///     deep_merge(defaults, project),
///     json!({"store": {"schema": "public", "realtime": false}})
/// );
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let value = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge tiers lowest-priority first.
pub fn deep_merge_all(tiers: impl IntoIterator<Item = Value>) -> Value {
    tiers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_keys_merge_individually() {
        let base = json!({"store": {"url": "https://a", "schema": "public"}, "ui": {"port": 1}});
        let overlay = json!({"store": {"url": "https://b"}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"store": {"url": "https://b", "schema": "public"}, "ui": {"port": 1}})
        );
    }

    #[test]
    fn test_null_keeps_lower_tier() {
        let base = json!({"store": {"access_token": "tok"}});
        let overlay = json!({"store": {"access_token": null}});
        assert_eq!(deep_merge(base.clone(), overlay), base);
    }

    #[test]
    fn test_arrays_replace() {
        let merged = deep_merge(json!({"tables": ["projects", "tasks"]}), json!({"tables": ["tasks"]}));
        assert_eq!(merged, json!({"tables": ["tasks"]}));
    }

    #[test]
    fn test_later_tiers_win() {
        let merged = deep_merge_all([
            json!({"ui": {"port": 31994}, "views": {"upcoming_days": 14}}),
            json!({"ui": {"port": 4000}}),
            json!({"ui": {"port": 5000}, "views": null}),
        ]);
        assert_eq!(merged, json!({"ui": {"port": 5000}, "views": {"upcoming_days": 14}}));
    }

    #[test]
    fn test_scalar_and_object_replace_each_other() {
        assert_eq!(deep_merge(json!({"v": 1}), json!({"v": {"x": 1}})), json!({"v": {"x": 1}}));
        assert_eq!(deep_merge(json!({"v": {"x": 1}}), json!({"v": 1})), json!({"v": 1}));
    }
}
