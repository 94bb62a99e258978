use serde_json::{Map, Value};

/// Field names a mapper may never write onto an instance. Any of these present
/// in mapper output is dropped silently.
pub const RESERVED_FIELD_NAMES: &[&str] = &["prototype", "__proto__", "toString", "constructor"];

fn is_reserved(name: &str) -> bool {
    RESERVED_FIELD_NAMES.contains(&name)
}

/// Apply the reserved-name deny filter to raw mapper output.
///
/// The map is taken by value, so the stored field values share nothing with the
/// mapper's caller; mutating the data a mapper was built from cannot reach an
/// already-constructed instance.
pub(crate) fn sanitize_fields(raw: Map<String, Value>) -> Map<String, Value> {
    raw.into_iter()
        .filter(|(name, _)| !is_reserved(name))
        .collect()
}
