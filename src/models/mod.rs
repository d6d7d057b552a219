//! Domain model module declarations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod envelope;
pub mod release;
pub mod session;

/// Deserialize an optional `{"entities": [...]}` wrapper as a plain vector.
///
/// A missing or `null` wrapper, or a wrapper with `null` entities, yields
/// an empty vector.
pub(crate) fn deserialize_entities<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    struct Page<T> {
        entities: Option<Vec<T>>,
    }

    let page = Option::<Page<T>>::deserialize(deserializer)?;
    Ok(page.and_then(|p| p.entities).unwrap_or_default())
}

/// Serialize a vector back into the `{"entities": [...]}` wrapper.
pub(crate) fn serialize_entities<S, T>(items: &[T], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    #[derive(Serialize)]
    struct Page<'a, T> {
        entities: &'a [T],
    }

    Page { entities: items }.serialize(serializer)
}
