//! S3 constructs

use stackgraph_core::resource::{RemovalPolicy, Resource, ResourceHandle, Value};
use stackgraph_core::stack::Stack;

use super::Result;
use crate::schemas::s3;

/// Bucket construct properties
#[derive(Debug, Clone)]
pub struct BucketProps {
    pub bucket_name: Option<String>,
    pub block_public_access: bool,
    pub versioned: bool,
    pub removal_policy: RemovalPolicy,
}

impl Default for BucketProps {
    fn default() -> Self {
        Self {
            bucket_name: None,
            block_public_access: true,
            versioned: false,
            removal_policy: RemovalPolicy::Retain,
        }
    }
}

/// An S3 bucket
#[derive(Debug, Clone)]
pub struct Bucket {
    pub handle: ResourceHandle,
}

impl Bucket {
    pub fn new(stack: &mut Stack, id: &str, props: BucketProps) -> Result<Self> {
        let mut resource = Resource::new(s3::BUCKET, id).with_removal_policy(props.removal_policy);
        if let Some(name) = props.bucket_name {
            resource.set_property("bucket_name", name);
        }
        if props.block_public_access {
            resource.set_property(
                "public_access_block_configuration",
                Value::map([
                    ("block_public_acls", Value::Bool(true)),
                    ("block_public_policy", Value::Bool(true)),
                    ("ignore_public_acls", Value::Bool(true)),
                    ("restrict_public_buckets", Value::Bool(true)),
                ]),
            );
        }
        if props.versioned {
            resource.set_property(
                "versioning_configuration",
                Value::map([("status", Value::string("Enabled"))]),
            );
        }

        let handle = stack.add_resource(resource)?;
        Ok(Self { handle })
    }

    pub fn bucket_name(&self) -> Value {
        self.handle.reference()
    }

    pub fn arn(&self) -> Value {
        self.handle.attr("Arn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgraph_core::stack::Environment;

    #[test]
    fn private_and_retained_by_default() {
        let mut stack = Stack::new("Test", Environment::default()).unwrap();
        let bucket = Bucket::new(&mut stack, "Assets", BucketProps::default()).unwrap();
        assert_eq!(bucket.bucket_name(), Value::reference("Assets"));

        let resource = stack.resource("Assets").unwrap();
        assert!(resource.is_retained());
        assert_eq!(
            resource
                .property("public_access_block_configuration")
                .and_then(|c| c.get("restrict_public_buckets")),
            Some(&Value::Bool(true))
        );
        assert!(resource.property("bucket_name").is_none());
    }
}
