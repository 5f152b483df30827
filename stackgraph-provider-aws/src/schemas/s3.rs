//! S3 bucket schema definition

use stackgraph_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::types as aws_types;

pub const BUCKET: &str = "AWS::S3::Bucket";

/// Returns the schema for S3 buckets
pub fn bucket_schema() -> ResourceSchema {
    ResourceSchema::new(BUCKET)
        .with_description("An S3 bucket for object storage")
        .attribute(
            AttributeSchema::new("bucket_name", aws_types::bucket_name())
                .with_description("Bucket name (generated by the engine if not set)"),
        )
        .attribute(
            AttributeSchema::new(
                "public_access_block_configuration",
                AttributeType::Struct {
                    name: "PublicAccessBlockConfiguration".to_string(),
                    fields: vec![
                        AttributeSchema::new("block_public_acls", AttributeType::Bool),
                        AttributeSchema::new("block_public_policy", AttributeType::Bool),
                        AttributeSchema::new("ignore_public_acls", AttributeType::Bool),
                        AttributeSchema::new("restrict_public_buckets", AttributeType::Bool),
                    ],
                },
            )
            .with_description("Blocks public access to the bucket and its objects"),
        )
        .attribute(AttributeSchema::new(
            "versioning_configuration",
            AttributeType::Struct {
                name: "VersioningConfiguration".to_string(),
                fields: vec![
                    AttributeSchema::new(
                        "status",
                        AttributeType::Enum(vec!["Enabled".to_string(), "Suspended".to_string()]),
                    )
                    .required(),
                ],
            },
        ))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns all S3-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![bucket_schema()]
}
