//! Shared data model for gantry: resource identity tokens and the property
//! value model used to represent resource state, including values that are
//! not known until provisioning completes.

pub mod access;
pub mod property;
pub mod tokens;

pub use access::PropertyError;
pub use property::{Computed, Output, PropertyKey, PropertyMap, PropertySet, PropertyValue};
pub use tokens::{Name, ResourceId, Urn};
