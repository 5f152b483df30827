//! Secrets Manager schema definitions

use stackgraph_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

pub const SECRET: &str = "AWS::SecretsManager::Secret";
pub const SECRET_TARGET_ATTACHMENT: &str = "AWS::SecretsManager::SecretTargetAttachment";

/// Returns the schema for Secret
pub fn secret_schema() -> ResourceSchema {
    ResourceSchema::new(SECRET)
        .with_description("A secret, optionally generated by the engine")
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new(
            "generate_secret_string",
            AttributeType::Struct {
                name: "GenerateSecretString".to_string(),
                fields: vec![
                    AttributeSchema::new("exclude_characters", AttributeType::String),
                    AttributeSchema::new("generate_string_key", AttributeType::String),
                    AttributeSchema::new("password_length", types::positive_int()),
                    AttributeSchema::new("secret_string_template", AttributeType::String),
                ],
            },
        ))
}

/// Returns the schema for Secret Target Attachment
pub fn secret_target_attachment_schema() -> ResourceSchema {
    ResourceSchema::new(SECRET_TARGET_ATTACHMENT)
        .with_description("Binds a secret to the database it holds credentials for")
        .attribute(AttributeSchema::new("secret_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("target_id", AttributeType::String).required())
        .attribute(
            AttributeSchema::new(
                "target_type",
                AttributeType::Enum(vec![
                    "AWS::RDS::DBCluster".to_string(),
                    "AWS::RDS::DBInstance".to_string(),
                ]),
            )
            .required(),
        )
}

/// Returns all Secrets Manager-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![secret_schema(), secret_target_attachment_schema()]
}
