//! Elastic Load Balancing v2 schema definitions

use stackgraph_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::types as aws_types;

pub const LOAD_BALANCER: &str = "AWS::ElasticLoadBalancingV2::LoadBalancer";
pub const LISTENER: &str = "AWS::ElasticLoadBalancingV2::Listener";
pub const TARGET_GROUP: &str = "AWS::ElasticLoadBalancingV2::TargetGroup";

fn strings() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

fn key_value(name: &str) -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Struct {
        name: name.to_string(),
        fields: vec![
            AttributeSchema::new("key", AttributeType::String).required(),
            AttributeSchema::new("value", AttributeType::String).required(),
        ],
    }))
}

fn http_protocol() -> AttributeType {
    AttributeType::Enum(vec!["HTTP".to_string(), "HTTPS".to_string()])
}

/// Returns the schema for Load Balancer
pub fn load_balancer_schema() -> ResourceSchema {
    ResourceSchema::new(LOAD_BALANCER)
        .with_description("An application or network load balancer")
        .attribute(AttributeSchema::new(
            "scheme",
            AttributeType::Enum(vec![
                "internet-facing".to_string(),
                "internal".to_string(),
            ]),
        ))
        .attribute(AttributeSchema::new("security_groups", strings()))
        .attribute(AttributeSchema::new("subnets", strings()).required())
        .attribute(AttributeSchema::new(
            "type",
            AttributeType::Enum(vec![
                "application".to_string(),
                "network".to_string(),
                "gateway".to_string(),
            ]),
        ))
        .attribute(AttributeSchema::new(
            "load_balancer_attributes",
            key_value("LoadBalancerAttribute"),
        ))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns the schema for Listener
pub fn listener_schema() -> ResourceSchema {
    let action = AttributeType::Struct {
        name: "Action".to_string(),
        fields: vec![
            AttributeSchema::new(
                "type",
                AttributeType::Enum(vec!["forward".to_string(), "fixed-response".to_string()]),
            )
            .required(),
            AttributeSchema::new("target_group_arn", AttributeType::String),
        ],
    };

    ResourceSchema::new(LISTENER)
        .with_description("A load balancer listener")
        .attribute(AttributeSchema::new("load_balancer_arn", AttributeType::String).required())
        .attribute(AttributeSchema::new("port", aws_types::port_number()).required())
        .attribute(AttributeSchema::new("protocol", http_protocol()).required())
        .attribute(
            AttributeSchema::new("default_actions", AttributeType::List(Box::new(action)))
                .required()
                .with_description("Set when targets are added to the listener"),
        )
}

/// Returns the schema for Target Group
pub fn target_group_schema() -> ResourceSchema {
    ResourceSchema::new(TARGET_GROUP)
        .with_description("A group of targets behind a listener")
        .attribute(AttributeSchema::new("port", aws_types::port_number()).required())
        .attribute(AttributeSchema::new("protocol", http_protocol()).required())
        .attribute(AttributeSchema::new(
            "target_type",
            AttributeType::Enum(vec![
                "instance".to_string(),
                "ip".to_string(),
                "lambda".to_string(),
            ]),
        ))
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String))
        .attribute(AttributeSchema::new("health_check_path", AttributeType::String))
        .attribute(AttributeSchema::new(
            "health_check_interval_seconds",
            types::positive_int(),
        ))
        .attribute(AttributeSchema::new(
            "health_check_timeout_seconds",
            types::positive_int(),
        ))
        .attribute(AttributeSchema::new(
            "healthy_threshold_count",
            types::positive_int(),
        ))
        .attribute(AttributeSchema::new(
            "unhealthy_threshold_count",
            types::positive_int(),
        ))
        .attribute(AttributeSchema::new(
            "target_group_attributes",
            key_value("TargetGroupAttribute"),
        ))
}

/// Returns all ELBv2-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        load_balancer_schema(),
        listener_schema(),
        target_group_schema(),
    ]
}
