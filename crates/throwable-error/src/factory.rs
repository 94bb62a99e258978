use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::Result;
use crate::error::ThrowableError;
use crate::fields::sanitize_fields;

/// Opaque identity of a generated error type.
///
/// Every factory call allocates a fresh tag, so two types created with the same
/// display name stay distinguishable. Membership checks compare tags, never
/// names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TypeTag(u64);

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

impl TypeTag {
    /// Tag of the base error type; terminates every ancestor chain.
    pub const BASE: TypeTag = TypeTag(0);

    fn next() -> Self {
        TypeTag(NEXT_TAG.fetch_add(1, Ordering::Relaxed))
    }
}

/// Mapper from constructor arguments to the instance's field map. A mapper
/// error aborts construction and reaches the caller unchanged.
pub type MapperFn = Arc<dyn Fn(&[Value]) -> Result<Map<String, Value>> + Send + Sync>;

/// Default calling convention: one string argument, mapped to `message`.
fn default_mapper() -> MapperFn {
    Arc::new(|args| {
        let mut fields = Map::new();
        if let Some(Value::String(message)) = args.first() {
            fields.insert("message".to_string(), Value::String(message.clone()));
        }
        Ok(fields)
    })
}

/// Options accepted by [`get_throwable_error`].
#[derive(Clone, Default)]
pub struct ErrorTypeOptions {
    extend_from: Option<ErrorType>,
    mapper_fn: Option<MapperFn>,
}

impl ErrorTypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parent type for the new type. Defaults to [`ErrorType::base`].
    pub fn extend_from(mut self, parent: ErrorType) -> Self {
        self.extend_from = Some(parent);
        self
    }

    /// Mapper for the new type's constructor arguments.
    pub fn mapper_fn(
        mut self,
        mapper: impl Fn(&[Value]) -> Result<Map<String, Value>> + Send + Sync + 'static,
    ) -> Self {
        self.mapper_fn = Some(Arc::new(mapper));
        self
    }
}

/// Runtime descriptor of a generated error type.
///
/// Stands in for the constructor a dynamic language would return: it knows its
/// name, its identity tag, its full ancestor chain (computed once at creation),
/// its parent, and the mapper used to build instances. Cloning is cheap and the
/// descriptor is immutable, so it can be created at module load and reused as
/// the parent of further types indefinitely.
#[derive(Clone)]
pub struct ErrorType {
    inner: Arc<ErrorTypeInner>,
}

struct ErrorTypeInner {
    name: String,
    tag: TypeTag,
    chain: Arc<[TypeTag]>,
    parent: Option<ErrorType>,
    mapper: MapperFn,
}

impl ErrorType {
    /// The base error type every chain terminates at. Usable as an explicit
    /// `extend_from` target; its instances carry only the default mapping.
    pub fn base() -> Self {
        Self {
            inner: Arc::new(ErrorTypeInner {
                name: "ThrowableError".to_string(),
                tag: TypeTag::BASE,
                chain: vec![TypeTag::BASE].into(),
                parent: None,
                mapper: default_mapper(),
            }),
        }
    }

    /// The display name given to the factory, reported by the descriptor and
    /// by every instance.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn tag(&self) -> TypeTag {
        self.inner.tag
    }

    pub fn parent(&self) -> Option<&ErrorType> {
        self.inner.parent.as_ref()
    }

    /// Ancestor names in order, nearest parent first, ending at the base.
    pub fn ancestors(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut cursor = self.parent();
        while let Some(ty) = cursor {
            names.push(ty.name());
            cursor = ty.parent();
        }
        names
    }

    pub(crate) fn chain(&self) -> &Arc<[TypeTag]> {
        &self.inner.chain
    }

    /// Build an instance from constructor arguments.
    ///
    /// Runs the mapper, drops reserved field names from its output, promotes a
    /// string-valued `message`, and stamps the ancestor chain onto the
    /// instance. A mapper error propagates unchanged and no instance is
    /// produced.
    pub fn construct(&self, args: &[Value]) -> Result<ThrowableError> {
        let raw = (self.inner.mapper)(args)?;
        Ok(ThrowableError::new(
            self.inner.name.clone(),
            Arc::clone(&self.inner.chain),
            sanitize_fields(raw),
        ))
    }

    /// Sugar for the default calling convention of a single message argument.
    pub fn with_message(&self, message: impl Into<String>) -> Result<ThrowableError> {
        self.construct(&[Value::String(message.into())])
    }
}

impl fmt::Debug for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorType")
            .field("name", &self.inner.name)
            .field("tag", &self.inner.tag)
            .field("chain", &self.inner.chain)
            .finish_non_exhaustive()
    }
}

/// Define a new error type at runtime.
///
/// The returned [`ErrorType`] reports `name` for itself and for every instance
/// it constructs. Its ancestor chain is the parent's chain with the new type's
/// tag prepended, so membership checks hold transitively for any chain depth;
/// the parent itself is never touched. Without options the type extends the
/// base error type and uses the default single-message mapper.
///
/// ```
/// use serde_json::{Map, json};
/// use throwable_error::{ErrorTypeOptions, get_throwable_error};
///
/// let parse_error = get_throwable_error(
///     "ParseError",
///     ErrorTypeOptions::new().mapper_fn(|args| {
///         let mut fields = Map::new();
///         fields.insert("message".to_string(), json!("parse failed"));
///         fields.insert("offset".to_string(), args.first().cloned().unwrap_or(json!(null)));
///         Ok(fields)
///     }),
/// );
///
/// let err = parse_error.construct(&[json!(17)])?;
/// assert_eq!(err.name(), "ParseError");
/// assert_eq!(err.get_field("offset"), Some(&json!(17)));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_throwable_error(name: impl Into<String>, options: ErrorTypeOptions) -> ErrorType {
    let ErrorTypeOptions {
        extend_from,
        mapper_fn,
    } = options;
    let parent = extend_from.unwrap_or_else(ErrorType::base);
    let mapper = mapper_fn.unwrap_or_else(default_mapper);

    let tag = TypeTag::next();
    let mut chain = Vec::with_capacity(parent.chain().len() + 1);
    chain.push(tag);
    chain.extend_from_slice(parent.chain());

    ErrorType {
        inner: Arc::new(ErrorTypeInner {
            name: name.into(),
            tag,
            chain: chain.into(),
            parent: Some(parent),
            mapper,
        }),
    }
}
