//! Error types defined at runtime, with multi-level "is-a" relationships.
//!
//! [`get_throwable_error`] builds a new nominal error type from a name, an
//! optional parent type, and an optional mapper that turns constructor
//! arguments into instance fields. Instances report the type's name, carry the
//! mapped fields, and satisfy membership checks against the type itself, every
//! ancestor up to the [`ThrowableError`] base, and `std::error::Error`.
//!
//! ```
//! use throwable_error::{get_throwable_error, ErrorTypeOptions};
//!
//! let ws_error = get_throwable_error("WebSocketError", ErrorTypeOptions::default());
//! let json_error = get_throwable_error(
//!     "WebSocketJSONError",
//!     ErrorTypeOptions::new().extend_from(ws_error.clone()),
//! );
//!
//! let err = json_error.with_message("unable to parse frame")?;
//! assert_eq!(err.name(), "WebSocketJSONError");
//! assert_eq!(err.message(), Some("unable to parse frame"));
//! assert!(err.is_instance_of(&json_error));
//! assert!(err.is_instance_of(&ws_error));
//! assert!(err.is_throwable_error());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Dynamic fields have no direct equivalent in a statically typed instance, so
//! anything beyond `name`, `message` and `stack` lives in an open map of
//! [`serde_json::Value`] reachable through [`ThrowableError::get_field`].

mod error;
mod factory;
mod fields;

pub use error::ThrowableError;
pub use factory::{ErrorType, ErrorTypeOptions, MapperFn, TypeTag, get_throwable_error};
pub use fields::RESERVED_FIELD_NAMES;

pub type Result<T> = anyhow::Result<T>;
