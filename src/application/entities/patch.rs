//! Partial-update fields for nullable columns.
//!
//! A field is `None` when the column is left alone, `Some(None)` to clear it
//! and `Some(Some(v))` to set it. JSON `null` deserializes to `Some(None)`;
//! an absent key needs `#[serde(default)]` to become `None`.

use serde::{Deserialize, Deserializer};

pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// The value a patch field sets, if it sets one.
pub(crate) fn value(field: &Option<Option<String>>) -> Option<&str> {
    field.as_ref().and_then(Option::as_deref)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Patch {
        #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
        note: Option<Option<String>>,
    }

    #[test]
    fn absent_null_and_value_stay_distinct() {
        let absent: Patch = serde_json::from_value(json!({})).expect("absent");
        let cleared: Patch = serde_json::from_value(json!({ "note": null })).expect("null");
        let set: Patch = serde_json::from_value(json!({ "note": "hola" })).expect("value");

        assert_eq!(absent.note, None);
        assert_eq!(cleared.note, Some(None));
        assert_eq!(value(&set.note), Some("hola"));

        assert_eq!(serde_json::to_value(&absent).expect("encode"), json!({}));
        assert_eq!(
            serde_json::to_value(&cleared).expect("encode"),
            json!({ "note": null })
        );
    }
}
