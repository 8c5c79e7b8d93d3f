//! The resource interface of gantry: the deployment context consulted while
//! marshaling, and the conversion between property maps and the wire struct
//! exchanged with resource providers and state storage.

pub mod context;
pub mod marshal;

pub use context::{DeploymentContext, ResourceResolver, ResourceState};
pub use marshal::{
    marshal_properties, marshal_properties_with_unknowns, marshal_property_value,
    unmarshal_properties, unmarshal_property_value, MarshalOptions,
};
