//! Provider - Trait abstracting a target platform's resource types
//!
//! A Provider knows which resource types exist on its platform, what their
//! properties look like, and how property names are spelled on the wire.
//! It never talks to the platform: realising the resources is the
//! provisioning engine's job.

use std::collections::HashMap;

use crate::schema::ResourceSchema;

/// Definition of a resource type that a Provider can emit
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "AWS::EC2::VPC")
    fn name(&self) -> &'static str;

    /// Property schema for this resource type
    fn schema(&self) -> ResourceSchema;
}

/// Main Provider trait
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "aws")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can emit
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Wire name of an attribute that has no explicit provider name
    fn property_name(&self, attribute: &str) -> String;

    /// Schemas of all resource types, keyed by type name
    fn schemas(&self) -> HashMap<String, ResourceSchema> {
        self.resource_types()
            .into_iter()
            .map(|t| (t.name().to_string(), t.schema()))
            .collect()
    }
}
