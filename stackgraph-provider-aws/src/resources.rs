//! Resource type definitions for the AWS provider
//!
//! Each type pairs a CloudFormation type name with its schema.

use stackgraph_core::provider::ResourceType;
use stackgraph_core::schema::ResourceSchema;

use crate::schemas::{ec2, ecs, elbv2, iam, logs, rds, s3, secretsmanager};

// =============================================================================
// Resource Type Definitions
// =============================================================================

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $schema:path) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema()
            }
        }
    };
}

define_resource_type!(VpcType, ec2::VPC, ec2::vpc_schema);
define_resource_type!(SubnetType, ec2::SUBNET, ec2::subnet_schema);
define_resource_type!(
    InternetGatewayType,
    ec2::INTERNET_GATEWAY,
    ec2::internet_gateway_schema
);
define_resource_type!(
    VpcGatewayAttachmentType,
    ec2::VPC_GATEWAY_ATTACHMENT,
    ec2::vpc_gateway_attachment_schema
);
define_resource_type!(RouteTableType, ec2::ROUTE_TABLE, ec2::route_table_schema);
define_resource_type!(RouteType, ec2::ROUTE, ec2::route_schema);
define_resource_type!(
    RouteTableAssociationType,
    ec2::SUBNET_ROUTE_TABLE_ASSOCIATION,
    ec2::subnet_route_table_association_schema
);
define_resource_type!(EipType, ec2::EIP, ec2::eip_schema);
define_resource_type!(NatGatewayType, ec2::NAT_GATEWAY, ec2::nat_gateway_schema);
define_resource_type!(
    SecurityGroupType,
    ec2::SECURITY_GROUP,
    ec2::security_group_schema
);
define_resource_type!(
    SecurityGroupIngressType,
    ec2::SECURITY_GROUP_INGRESS,
    ec2::security_group_ingress_schema
);
define_resource_type!(
    LoadBalancerType,
    elbv2::LOAD_BALANCER,
    elbv2::load_balancer_schema
);
define_resource_type!(ListenerType, elbv2::LISTENER, elbv2::listener_schema);
define_resource_type!(
    TargetGroupType,
    elbv2::TARGET_GROUP,
    elbv2::target_group_schema
);
define_resource_type!(ClusterType, ecs::CLUSTER, ecs::cluster_schema);
define_resource_type!(
    TaskDefinitionType,
    ecs::TASK_DEFINITION,
    ecs::task_definition_schema
);
define_resource_type!(ServiceType, ecs::SERVICE, ecs::service_schema);
define_resource_type!(BucketType, s3::BUCKET, s3::bucket_schema);
define_resource_type!(DbClusterType, rds::DB_CLUSTER, rds::db_cluster_schema);
define_resource_type!(DbInstanceType, rds::DB_INSTANCE, rds::db_instance_schema);
define_resource_type!(
    DbSubnetGroupType,
    rds::DB_SUBNET_GROUP,
    rds::db_subnet_group_schema
);
define_resource_type!(RoleType, iam::ROLE, iam::role_schema);
define_resource_type!(PolicyType, iam::POLICY, iam::policy_schema);
define_resource_type!(SecretType, secretsmanager::SECRET, secretsmanager::secret_schema);
define_resource_type!(
    SecretTargetAttachmentType,
    secretsmanager::SECRET_TARGET_ATTACHMENT,
    secretsmanager::secret_target_attachment_schema
);
define_resource_type!(LogGroupType, logs::LOG_GROUP, logs::log_group_schema);

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(VpcType),
        Box::new(SubnetType),
        Box::new(InternetGatewayType),
        Box::new(VpcGatewayAttachmentType),
        Box::new(RouteTableType),
        Box::new(RouteType),
        Box::new(RouteTableAssociationType),
        Box::new(EipType),
        Box::new(NatGatewayType),
        Box::new(SecurityGroupType),
        Box::new(SecurityGroupIngressType),
        Box::new(LoadBalancerType),
        Box::new(ListenerType),
        Box::new(TargetGroupType),
        Box::new(ClusterType),
        Box::new(TaskDefinitionType),
        Box::new(ServiceType),
        Box::new(BucketType),
        Box::new(DbClusterType),
        Box::new(DbInstanceType),
        Box::new(DbSubnetGroupType),
        Box::new(RoleType),
        Box::new(PolicyType),
        Box::new(SecretType),
        Box::new(SecretTargetAttachmentType),
        Box::new(LogGroupType),
    ]
}
