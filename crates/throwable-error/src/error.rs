use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::factory::{ErrorType, TypeTag};

/// Base shape shared by every generated error type.
///
/// `name`, `message` and `stack` are first-class members; every other field
/// produced by a mapper is kept in an open map and read back through
/// [`ThrowableError::get_field`]. The name is fixed at construction and only
/// readable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ThrowableError {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip)]
    stack: String,
    #[serde(skip)]
    chain: Arc<[TypeTag]>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl ThrowableError {
    /// Built by [`ErrorType::construct`] after reserved keys are filtered out.
    pub(crate) fn new(name: String, chain: Arc<[TypeTag]>, mut fields: Map<String, Value>) -> Self {
        // A string-valued `message` is promoted out of the open map; any other
        // value type stays a plain field.
        let message = match fields.remove("message") {
            Some(Value::String(text)) => Some(text),
            Some(other) => {
                fields.insert("message".to_string(), other);
                None
            }
            None => None,
        };
        // `name` and `stack` are fixed at construction. A mapper-supplied key
        // with either name is dropped so it cannot shadow the promoted member,
        // on the struct or on the serialized (flattened) surface.
        fields.remove("name");
        fields.remove("stack");
        Self {
            name,
            message,
            stack: Backtrace::capture().to_string(),
            chain,
            fields,
        }
    }

    /// Name of the generated type this instance belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Backtrace text captured at construction. Empty-ish when backtraces are
    /// disabled at runtime (`RUST_BACKTRACE` unset).
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Look up an extra field produced by the mapper.
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// All extra fields, sorted by field name.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Membership check against a generated type: true for the instance's own
    /// type and every ancestor of it.
    pub fn is_instance_of(&self, ty: &ErrorType) -> bool {
        self.chain.contains(&ty.tag())
    }

    /// Membership check against the base error type. Every chain terminates at
    /// the base, so this holds for all instances.
    pub fn is_throwable_error(&self) -> bool {
        self.chain.contains(&TypeTag::BASE)
    }
}

impl fmt::Display for ThrowableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.name, message),
            None => write!(f, "{}", self.name),
        }
    }
}

impl std::error::Error for ThrowableError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorTypeOptions, get_throwable_error};
    use serde_json::json;

    fn mapped(fields: Map<String, Value>) -> ThrowableError {
        ThrowableError::new("TestError".to_string(), vec![TypeTag::BASE].into(), fields)
    }

    #[test]
    fn string_message_is_promoted_out_of_the_open_map() {
        let mut fields = Map::new();
        fields.insert("message".to_string(), json!("boom"));
        fields.insert("code".to_string(), json!(404));
        let err = mapped(fields);
        assert_eq!(err.message(), Some("boom"));
        assert!(err.get_field("message").is_none());
        assert_eq!(err.get_field("code"), Some(&json!(404)));
    }

    #[test]
    fn non_string_message_stays_a_plain_field() {
        let mut fields = Map::new();
        fields.insert("message".to_string(), json!({"nested": true}));
        let err = mapped(fields);
        assert_eq!(err.message(), None);
        assert_eq!(err.get_field("message"), Some(&json!({"nested": true})));
    }

    #[test]
    fn display_includes_message_when_present() {
        let mut fields = Map::new();
        fields.insert("message".to_string(), json!("out of frames"));
        assert_eq!(mapped(fields).to_string(), "TestError: out of frames");
        assert_eq!(mapped(Map::new()).to_string(), "TestError");
    }

    #[test]
    fn serializes_name_message_and_flattened_fields() {
        let ty = get_throwable_error(
            "SerdeError",
            ErrorTypeOptions::new().mapper_fn(|_args| {
                let mut fields = Map::new();
                fields.insert("message".to_string(), json!("bad payload"));
                fields.insert("status".to_string(), json!(502));
                Ok(fields)
            }),
        );
        let err = ty.construct(&[]).expect("construct");
        let value = serde_json::to_value(&err).expect("serialize");
        assert_eq!(value["name"], "SerdeError");
        assert_eq!(value["message"], "bad payload");
        assert_eq!(value["status"], 502);
        assert!(value.get("stack").is_none());
        assert!(value.get("chain").is_none());
    }

    #[test]
    fn mapper_cannot_shadow_the_fixed_name_or_stack() {
        let ty = get_throwable_error(
            "RealName",
            ErrorTypeOptions::new().mapper_fn(|_args| {
                let mut fields = Map::new();
                fields.insert("name".to_string(), json!("FakeName"));
                fields.insert("stack".to_string(), json!("fake stack"));
                fields.insert("code".to_string(), json!(7));
                Ok(fields)
            }),
        );
        let err = ty.construct(&[]).expect("construct");
        assert_eq!(err.name(), "RealName");
        assert!(err.get_field("name").is_none());
        assert!(err.get_field("stack").is_none());

        let value = serde_json::to_value(&err).expect("serialize");
        assert_eq!(value["name"], "RealName");
        assert!(value.get("stack").is_none());
        assert_eq!(value["code"], 7);
    }

    #[test]
    fn fields_iterate_sorted_by_name() {
        let mut fields = Map::new();
        fields.insert("zebra".to_string(), json!(1));
        fields.insert("alpha".to_string(), json!(2));
        let err = mapped(fields);
        let names: Vec<&str> = err.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["alpha", "zebra"]);
    }

    #[test]
    fn converts_into_anyhow_error_unchanged() {
        let ty = get_throwable_error("LiftedError", ErrorTypeOptions::default());
        let err = ty.with_message("lift me").expect("construct");
        let any: anyhow::Error = err.into();
        assert_eq!(any.to_string(), "LiftedError: lift me");
        assert!(any.downcast_ref::<ThrowableError>().is_some());
    }
}
