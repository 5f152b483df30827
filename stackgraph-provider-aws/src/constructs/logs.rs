//! CloudWatch Logs constructs

use stackgraph_core::resource::{RemovalPolicy, Resource, ResourceHandle, Value};
use stackgraph_core::stack::Stack;

use super::Result;
use crate::schemas::logs;

/// Log group construct properties
#[derive(Debug, Clone)]
pub struct LogGroupProps {
    /// Days to keep events; `None` keeps them forever
    pub retention_days: Option<u32>,
    pub removal_policy: RemovalPolicy,
}

impl Default for LogGroupProps {
    fn default() -> Self {
        Self {
            retention_days: Some(731),
            removal_policy: RemovalPolicy::Retain,
        }
    }
}

/// A CloudWatch log group
#[derive(Debug, Clone)]
pub struct LogGroup {
    pub handle: ResourceHandle,
}

impl LogGroup {
    pub fn new(stack: &mut Stack, id: &str, props: LogGroupProps) -> Result<Self> {
        let mut resource =
            Resource::new(logs::LOG_GROUP, id).with_removal_policy(props.removal_policy);
        if let Some(days) = props.retention_days {
            resource.set_property("retention_in_days", days);
        }
        let handle = stack.add_resource(resource)?;
        Ok(Self { handle })
    }

    pub fn name(&self) -> Value {
        self.handle.reference()
    }

    pub fn arn(&self) -> Value {
        self.handle.attr("Arn")
    }
}
