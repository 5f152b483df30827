//! EC2 networking schema definitions
//!
//! Based on the CloudFormation AWS::EC2::* resource types.
//! See: https://docs.aws.amazon.com/AWSCloudFormation/latest/UserGuide/AWS_EC2.html

use stackgraph_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::types as aws_types;

pub const VPC: &str = "AWS::EC2::VPC";
pub const SUBNET: &str = "AWS::EC2::Subnet";
pub const INTERNET_GATEWAY: &str = "AWS::EC2::InternetGateway";
pub const VPC_GATEWAY_ATTACHMENT: &str = "AWS::EC2::VPCGatewayAttachment";
pub const ROUTE_TABLE: &str = "AWS::EC2::RouteTable";
pub const ROUTE: &str = "AWS::EC2::Route";
pub const SUBNET_ROUTE_TABLE_ASSOCIATION: &str = "AWS::EC2::SubnetRouteTableAssociation";
pub const EIP: &str = "AWS::EC2::EIP";
pub const NAT_GATEWAY: &str = "AWS::EC2::NatGateway";
pub const SECURITY_GROUP: &str = "AWS::EC2::SecurityGroup";
pub const SECURITY_GROUP_INGRESS: &str = "AWS::EC2::SecurityGroupIngress";

/// Inline security group rule (ingress or egress)
fn rule_type(name: &str, peer_field: &str) -> AttributeType {
    AttributeType::Struct {
        name: name.to_string(),
        fields: vec![
            AttributeSchema::new("ip_protocol", aws_types::ip_protocol()).required(),
            AttributeSchema::new("cidr_ip", types::cidr()),
            AttributeSchema::new(peer_field, AttributeType::String),
            AttributeSchema::new("description", AttributeType::String),
            AttributeSchema::new("from_port", AttributeType::Int),
            AttributeSchema::new("to_port", AttributeType::Int),
        ],
    }
}

/// Returns the schema for VPC
pub fn vpc_schema() -> ResourceSchema {
    ResourceSchema::new(VPC)
        .with_description("An AWS VPC (Virtual Private Cloud)")
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .with_description("The IPv4 network range for the VPC, in CIDR notation"),
        )
        .attribute(AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool))
        .attribute(AttributeSchema::new("enable_dns_support", AttributeType::Bool))
        .attribute(AttributeSchema::new(
            "instance_tenancy",
            AttributeType::Enum(vec![
                "default".to_string(),
                "dedicated".to_string(),
                "host".to_string(),
            ]),
        ))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns the schema for Subnet
pub fn subnet_schema() -> ResourceSchema {
    ResourceSchema::new(SUBNET)
        .with_description("An AWS VPC Subnet")
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("cidr_block", types::cidr()).required())
        .attribute(AttributeSchema::new("availability_zone", AttributeType::String))
        .attribute(AttributeSchema::new("map_public_ip_on_launch", AttributeType::Bool))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns the schema for Internet Gateway
pub fn internet_gateway_schema() -> ResourceSchema {
    ResourceSchema::new(INTERNET_GATEWAY)
        .with_description("An AWS Internet Gateway")
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns the schema for VPC Gateway Attachment
pub fn vpc_gateway_attachment_schema() -> ResourceSchema {
    ResourceSchema::new(VPC_GATEWAY_ATTACHMENT)
        .with_description("Attaches an internet gateway to a VPC")
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("internet_gateway_id", AttributeType::String))
}

/// Returns the schema for Route Table
pub fn route_table_schema() -> ResourceSchema {
    ResourceSchema::new(ROUTE_TABLE)
        .with_description("An AWS VPC Route Table")
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns the schema for Route
pub fn route_schema() -> ResourceSchema {
    ResourceSchema::new(ROUTE)
        .with_description("A route in an AWS VPC Route Table")
        .attribute(AttributeSchema::new("route_table_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("destination_cidr_block", types::cidr()).required())
        .attribute(
            AttributeSchema::new("gateway_id", AttributeType::String)
                .with_description("Internet Gateway ID (for internet-bound traffic)"),
        )
        .attribute(AttributeSchema::new("nat_gateway_id", AttributeType::String))
}

/// Returns the schema for Subnet Route Table Association
pub fn subnet_route_table_association_schema() -> ResourceSchema {
    ResourceSchema::new(SUBNET_ROUTE_TABLE_ASSOCIATION)
        .attribute(AttributeSchema::new("route_table_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("subnet_id", AttributeType::String).required())
}

/// Returns the schema for Elastic IP
pub fn eip_schema() -> ResourceSchema {
    ResourceSchema::new(EIP)
        .with_description("An Elastic IP address")
        .attribute(AttributeSchema::new(
            "domain",
            AttributeType::Enum(vec!["vpc".to_string(), "standard".to_string()]),
        ))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns the schema for NAT Gateway
pub fn nat_gateway_schema() -> ResourceSchema {
    ResourceSchema::new(NAT_GATEWAY)
        .with_description("A NAT gateway giving private subnets outbound access")
        .attribute(AttributeSchema::new("subnet_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("allocation_id", AttributeType::String))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns the schema for Security Group
pub fn security_group_schema() -> ResourceSchema {
    ResourceSchema::new(SECURITY_GROUP)
        .with_description("An AWS VPC Security Group")
        .attribute(AttributeSchema::new("group_description", AttributeType::String).required())
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String))
        .attribute(AttributeSchema::new(
            "security_group_ingress",
            AttributeType::List(Box::new(rule_type("Ingress", "source_security_group_id"))),
        ))
        .attribute(AttributeSchema::new(
            "security_group_egress",
            AttributeType::List(Box::new(rule_type(
                "Egress",
                "destination_security_group_id",
            ))),
        ))
        .attribute(AttributeSchema::new("tags", types::tags()))
}

/// Returns the schema for a standalone Security Group ingress rule
pub fn security_group_ingress_schema() -> ResourceSchema {
    ResourceSchema::new(SECURITY_GROUP_INGRESS)
        .with_description("An inbound rule attached to a security group")
        .attribute(AttributeSchema::new("ip_protocol", aws_types::ip_protocol()).required())
        .attribute(AttributeSchema::new("group_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("cidr_ip", types::cidr()))
        .attribute(AttributeSchema::new(
            "source_security_group_id",
            AttributeType::String,
        ))
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("from_port", aws_types::port_number()))
        .attribute(AttributeSchema::new("to_port", aws_types::port_number()))
}

/// Returns all EC2-related schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        vpc_schema(),
        subnet_schema(),
        internet_gateway_schema(),
        vpc_gateway_attachment_schema(),
        route_table_schema(),
        route_schema(),
        subnet_route_table_association_schema(),
        eip_schema(),
        nat_gateway_schema(),
        security_group_schema(),
        security_group_ingress_schema(),
    ]
}
