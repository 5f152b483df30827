//! Effect - What the provisioning engine will do to one resource

use crate::resource::ResourceId;

/// A single step of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Create the resource
    Create(ResourceId),
    /// Delete the live resource
    Delete(ResourceId),
    /// Leave the live resource in place, detached from the stack
    Retain(ResourceId),
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(id) | Effect::Delete(id) | Effect::Retain(id) => id,
        }
    }

    /// Returns true if this Effect changes live infrastructure
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Retain(_))
    }
}
