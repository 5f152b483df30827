//! RDS schema definitions
//!
//! CloudFormation spells the "DB" acronym in capitals, so those attributes
//! carry explicit provider names.

use stackgraph_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::types as aws_types;

pub const DB_CLUSTER: &str = "AWS::RDS::DBCluster";
pub const DB_INSTANCE: &str = "AWS::RDS::DBInstance";
pub const DB_SUBNET_GROUP: &str = "AWS::RDS::DBSubnetGroup";

fn engine() -> AttributeType {
    AttributeType::Enum(vec![
        "aurora-postgresql".to_string(),
        "aurora-mysql".to_string(),
    ])
}

/// Returns the schema for DB Cluster
pub fn db_cluster_schema() -> ResourceSchema {
    ResourceSchema::new(DB_CLUSTER)
        .with_description("An Aurora database cluster")
        .attribute(AttributeSchema::new("engine", engine()).required())
        .attribute(AttributeSchema::new("engine_version", AttributeType::String))
        .attribute(AttributeSchema::new("database_name", AttributeType::String))
        .attribute(
            AttributeSchema::new("db_subnet_group_name", AttributeType::String)
                .with_provider_name("DBSubnetGroupName"),
        )
        .attribute(AttributeSchema::new("master_username", AttributeType::String))
        .attribute(AttributeSchema::new("master_user_password", AttributeType::String))
        .attribute(AttributeSchema::new(
            "vpc_security_group_ids",
            AttributeType::List(Box::new(AttributeType::String)),
        ))
        .attribute(AttributeSchema::new("port", aws_types::port_number()))
        .attribute(AttributeSchema::new("copy_tags_to_snapshot", AttributeType::Bool))
        .attribute(AttributeSchema::new("storage_encrypted", AttributeType::Bool))
        .attribute(
            AttributeSchema::new(
                "serverless_v2_scaling_configuration",
                AttributeType::Struct {
                    name: "ServerlessV2ScalingConfiguration".to_string(),
                    fields: vec![
                        AttributeSchema::new("min_capacity", aws_types::serverless_capacity())
                            .required(),
                        AttributeSchema::new("max_capacity", aws_types::serverless_capacity())
                            .required(),
                    ],
                },
            )
            .with_provider_name("ServerlessV2ScalingConfiguration"),
        )
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns the schema for DB Instance
pub fn db_instance_schema() -> ResourceSchema {
    ResourceSchema::new(DB_INSTANCE)
        .with_description("A database instance, here a member of an Aurora cluster")
        .attribute(
            AttributeSchema::new("db_cluster_identifier", AttributeType::String)
                .with_provider_name("DBClusterIdentifier"),
        )
        .attribute(
            AttributeSchema::new("db_instance_class", AttributeType::String)
                .required()
                .with_provider_name("DBInstanceClass"),
        )
        .attribute(
            AttributeSchema::new("db_subnet_group_name", AttributeType::String)
                .with_provider_name("DBSubnetGroupName"),
        )
        .attribute(AttributeSchema::new("engine", engine()).required())
        .attribute(AttributeSchema::new("publicly_accessible", AttributeType::Bool))
}

/// Returns the schema for DB Subnet Group
pub fn db_subnet_group_schema() -> ResourceSchema {
    ResourceSchema::new(DB_SUBNET_GROUP)
        .with_description("Subnets a database may be placed in")
        .attribute(
            AttributeSchema::new("db_subnet_group_description", AttributeType::String)
                .required()
                .with_provider_name("DBSubnetGroupDescription"),
        )
        .attribute(
            AttributeSchema::new(
                "subnet_ids",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .required(),
        )
}

/// Returns all RDS-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        db_cluster_schema(),
        db_instance_schema(),
        db_subnet_group_schema(),
    ]
}
