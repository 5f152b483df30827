//! IAM schema definitions

use stackgraph_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

pub const ROLE: &str = "AWS::IAM::Role";
pub const POLICY: &str = "AWS::IAM::Policy";

/// Returns the schema for Role
pub fn role_schema() -> ResourceSchema {
    ResourceSchema::new(ROLE)
        .with_description("An IAM role")
        .attribute(
            AttributeSchema::new("assume_role_policy_document", AttributeType::Any)
                .required()
                .with_description("Trust policy: who may assume the role"),
        )
        .attribute(AttributeSchema::new(
            "managed_policy_arns",
            AttributeType::List(Box::new(AttributeType::String)),
        ))
        .attribute(AttributeSchema::new("description", AttributeType::String))
}

/// Returns the schema for Policy
pub fn policy_schema() -> ResourceSchema {
    ResourceSchema::new(POLICY)
        .with_description("An inline IAM policy attached to roles")
        .attribute(AttributeSchema::new("policy_document", AttributeType::Any).required())
        .attribute(AttributeSchema::new("policy_name", AttributeType::String).required())
        .attribute(AttributeSchema::new(
            "roles",
            AttributeType::List(Box::new(AttributeType::String)),
        ))
}

/// Returns all IAM-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![role_schema(), policy_schema()]
}
