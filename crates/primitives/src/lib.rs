//! Core data types for the service registry: property values, ordered property
//! maps, and LDAP-style filters evaluated against them.

/// LDAP-style filter parsing and evaluation.
pub mod filter;
/// Insertion-ordered property maps and well-known keys.
pub mod properties;
/// Tagged-union property values.
pub mod value;

pub use filter::{Filter, FilterError};
pub use properties::{OBJECTCLASS, PropertyMap, SERVICE_ID, SERVICE_RANKING};
pub use value::Value;
