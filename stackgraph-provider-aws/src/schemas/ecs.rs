//! ECS schema definitions

use stackgraph_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::types as aws_types;

pub const CLUSTER: &str = "AWS::ECS::Cluster";
pub const TASK_DEFINITION: &str = "AWS::ECS::TaskDefinition";
pub const SERVICE: &str = "AWS::ECS::Service";

fn strings() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

fn container_definition() -> AttributeType {
    let name_value = |name: &str, value_field: &str| {
        AttributeType::List(Box::new(AttributeType::Struct {
            name: name.to_string(),
            fields: vec![
                AttributeSchema::new("name", AttributeType::String).required(),
                AttributeSchema::new(value_field, AttributeType::String).required(),
            ],
        }))
    };

    AttributeType::Struct {
        name: "ContainerDefinition".to_string(),
        fields: vec![
            AttributeSchema::new("name", AttributeType::String).required(),
            AttributeSchema::new("image", AttributeType::String).required(),
            AttributeSchema::new("essential", AttributeType::Bool),
            AttributeSchema::new("environment", name_value("KeyValuePair", "value")),
            AttributeSchema::new("secrets", name_value("Secret", "value_from")),
            AttributeSchema::new(
                "port_mappings",
                AttributeType::List(Box::new(AttributeType::Struct {
                    name: "PortMapping".to_string(),
                    fields: vec![
                        AttributeSchema::new("container_port", aws_types::port_number())
                            .required(),
                        AttributeSchema::new(
                            "protocol",
                            AttributeType::Enum(vec!["tcp".to_string(), "udp".to_string()]),
                        ),
                    ],
                })),
            ),
            AttributeSchema::new(
                "log_configuration",
                AttributeType::Struct {
                    name: "LogConfiguration".to_string(),
                    fields: vec![
                        AttributeSchema::new("log_driver", AttributeType::String).required(),
                        // awslogs-* option names are passed through verbatim
                        AttributeSchema::new(
                            "options",
                            AttributeType::Map(Box::new(AttributeType::String)),
                        ),
                    ],
                },
            ),
        ],
    }
}

/// Returns the schema for Cluster
pub fn cluster_schema() -> ResourceSchema {
    ResourceSchema::new(CLUSTER)
        .with_description("An ECS cluster")
        .attribute(AttributeSchema::new("cluster_name", AttributeType::String))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns the schema for Task Definition
pub fn task_definition_schema() -> ResourceSchema {
    ResourceSchema::new(TASK_DEFINITION)
        .with_description("An ECS task definition")
        .attribute(AttributeSchema::new("family", AttributeType::String))
        .attribute(AttributeSchema::new("cpu", aws_types::fargate_cpu()))
        .attribute(AttributeSchema::new("memory", AttributeType::String))
        .attribute(AttributeSchema::new(
            "network_mode",
            AttributeType::Enum(vec![
                "awsvpc".to_string(),
                "bridge".to_string(),
                "host".to_string(),
                "none".to_string(),
            ]),
        ))
        .attribute(AttributeSchema::new("requires_compatibilities", strings()))
        .attribute(AttributeSchema::new("task_role_arn", AttributeType::String))
        .attribute(AttributeSchema::new("execution_role_arn", AttributeType::String))
        .attribute(AttributeSchema::new(
            "runtime_platform",
            AttributeType::Struct {
                name: "RuntimePlatform".to_string(),
                fields: vec![
                    AttributeSchema::new(
                        "cpu_architecture",
                        AttributeType::Enum(vec!["X86_64".to_string(), "ARM64".to_string()]),
                    ),
                    AttributeSchema::new(
                        "operating_system_family",
                        AttributeType::Enum(vec!["LINUX".to_string()]),
                    ),
                ],
            },
        ))
        .attribute(
            AttributeSchema::new(
                "container_definitions",
                AttributeType::List(Box::new(container_definition())),
            )
            .required(),
        )
}

/// Returns the schema for Service
pub fn service_schema() -> ResourceSchema {
    ResourceSchema::new(SERVICE)
        .with_description("An ECS service running a task definition")
        .attribute(AttributeSchema::new("cluster", AttributeType::String).required())
        .attribute(AttributeSchema::new("task_definition", AttributeType::String).required())
        .attribute(AttributeSchema::new("desired_count", types::non_negative_int()))
        .attribute(AttributeSchema::new(
            "launch_type",
            AttributeType::Enum(vec!["FARGATE".to_string(), "EC2".to_string()]),
        ))
        .attribute(
            AttributeSchema::new("enable_ecs_managed_tags", AttributeType::Bool)
                .with_provider_name("EnableECSManagedTags"),
        )
        .attribute(AttributeSchema::new(
            "health_check_grace_period_seconds",
            types::non_negative_int(),
        ))
        .attribute(AttributeSchema::new(
            "deployment_configuration",
            AttributeType::Struct {
                name: "DeploymentConfiguration".to_string(),
                fields: vec![
                    AttributeSchema::new("maximum_percent", types::positive_int()),
                    AttributeSchema::new("minimum_healthy_percent", types::non_negative_int()),
                ],
            },
        ))
        .attribute(AttributeSchema::new(
            "deployment_controller",
            AttributeType::Struct {
                name: "DeploymentController".to_string(),
                fields: vec![AttributeSchema::new(
                    "type",
                    AttributeType::Enum(vec![
                        "ECS".to_string(),
                        "CODE_DEPLOY".to_string(),
                        "EXTERNAL".to_string(),
                    ]),
                )],
            },
        ))
        .attribute(AttributeSchema::new(
            "network_configuration",
            AttributeType::Struct {
                name: "NetworkConfiguration".to_string(),
                fields: vec![AttributeSchema::new(
                    "awsvpc_configuration",
                    AttributeType::Struct {
                        name: "AwsVpcConfiguration".to_string(),
                        fields: vec![
                            AttributeSchema::new(
                                "assign_public_ip",
                                AttributeType::Enum(vec![
                                    "ENABLED".to_string(),
                                    "DISABLED".to_string(),
                                ]),
                            ),
                            AttributeSchema::new("security_groups", strings()),
                            AttributeSchema::new("subnets", strings()).required(),
                        ],
                    },
                )],
            },
        ))
        .attribute(AttributeSchema::new(
            "load_balancers",
            AttributeType::List(Box::new(AttributeType::Struct {
                name: "LoadBalancer".to_string(),
                fields: vec![
                    AttributeSchema::new("container_name", AttributeType::String).required(),
                    AttributeSchema::new("container_port", aws_types::port_number()).required(),
                    AttributeSchema::new("target_group_arn", AttributeType::String),
                ],
            })),
        ))
}

/// Returns all ECS-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![cluster_schema(), task_definition_schema(), service_schema()]
}
