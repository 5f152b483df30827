//! CloudWatch Logs schema definitions

use stackgraph_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

pub const LOG_GROUP: &str = "AWS::Logs::LogGroup";

/// Returns the schema for Log Group
pub fn log_group_schema() -> ResourceSchema {
    ResourceSchema::new(LOG_GROUP)
        .with_description("A CloudWatch log group")
        .attribute(AttributeSchema::new("log_group_name", AttributeType::String))
        .attribute(AttributeSchema::new("retention_in_days", types::positive_int()))
}

/// Returns all CloudWatch Logs-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![log_group_schema()]
}
