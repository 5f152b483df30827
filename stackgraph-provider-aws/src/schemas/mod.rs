//! AWS resource schema definitions

pub mod ec2;
pub mod ecs;
pub mod elbv2;
pub mod iam;
pub mod logs;
pub mod rds;
pub mod s3;
pub mod secretsmanager;

use stackgraph_core::schema::ResourceSchema;

/// Returns all AWS schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(ec2::schemas());
    schemas.extend(ecs::schemas());
    schemas.extend(elbv2::schemas());
    schemas.extend(iam::schemas());
    schemas.extend(logs::schemas());
    schemas.extend(rds::schemas());
    schemas.extend(s3::schemas());
    schemas.extend(secretsmanager::schemas());
    schemas
}
