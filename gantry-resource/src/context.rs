use std::collections::BTreeMap;

use gantry_core::property::PropertyMap;
use gantry_core::tokens::{ResourceId, Urn};

/// The state of a single resource as known to the deployment engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState {
    /// The type of the resource, e.g. `"aws:ec2/instance"`.
    pub type_: String,
    /// The provider-assigned identifier; empty until provisioning completes.
    pub id: ResourceId,
    /// The properties of the resource.
    pub properties: PropertyMap,
}

/// Read-only lookup used during marshaling to resolve resource references
/// into provider identifiers. The deployment engine owns the construction and
/// mutation lifecycle; marshaling only ever reads.
pub trait ResourceResolver {
    /// The resource currently known under `urn`, if any.
    fn resource(&self, urn: &Urn) -> Option<&ResourceState>;

    /// The identifier `urn` had in the prior deployment, if any. Consulted
    /// only when marshaling permits old identifiers, for references to
    /// resources being replaced or deleted.
    fn old_id(&self, urn: &Urn) -> Option<&ResourceId>;
}

/// A resolver over the current deployment snapshot plus the identifiers that
/// resources had in the prior deployment.
#[derive(Debug, Clone, Default)]
pub struct DeploymentContext {
    resources: BTreeMap<Urn, ResourceState>,
    old_ids: BTreeMap<Urn, ResourceId>,
}

impl DeploymentContext {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert_resource(&mut self, urn: Urn, state: ResourceState) {
        self.resources.insert(urn, state);
    }

    pub fn insert_old_id(&mut self, urn: Urn, id: ResourceId) {
        self.old_ids.insert(urn, id);
    }
}

impl ResourceResolver for DeploymentContext {
    fn resource(&self, urn: &Urn) -> Option<&ResourceState> {
        self.resources.get(urn)
    }

    fn old_id(&self, urn: &Urn) -> Option<&ResourceId> {
        self.old_ids.get(urn)
    }
}
