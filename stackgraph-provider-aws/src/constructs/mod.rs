//! Constructs - Typed building blocks that expand into CloudFormation resources
//!
//! A construct declares its resources on a [`Stack`] when it is created and
//! hands back a value other constructs use to refer to it. Logical ids are
//! the construct id followed by the child id (`BackstageVpcPublicSubnet1`).

pub mod ec2;
pub mod ecs;
pub mod elbv2;
pub mod iam;
pub mod logs;
pub mod rds;
pub mod s3;

use stackgraph_core::resource::Value;
use stackgraph_core::stack::{Stack, StackError};

/// Construct error
#[derive(Debug, thiserror::Error)]
pub enum ConstructError {
    #[error(transparent)]
    Stack(#[from] StackError),

    #[error("Invalid {construct}: {message}")]
    InvalidConfiguration { construct: String, message: String },

    #[error("Unknown container '{container}' in task definition {task_definition}")]
    UnknownContainer {
        task_definition: String,
        container: String,
    },

    #[error("Container '{container}' has no port mapping for port {port}")]
    UnmappedPort { container: String, port: u16 },
}

impl ConstructError {
    pub fn invalid(construct: impl Into<String>, message: impl Into<String>) -> Self {
        ConstructError::InvalidConfiguration {
            construct: construct.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConstructError>;

/// A construct made of one or more declared resources
pub trait Construct {
    /// Construct id (also the prefix of its children's logical ids)
    fn id(&self) -> &str;

    /// Logical ids of the resources this construct has declared so far
    fn node_ids(&self, stack: &Stack) -> Vec<String>;
}

/// Make every resource of `from` depend on every resource of `on`
///
/// This is an ordering edge only; no property refers to `on`.
pub fn add_dependency(stack: &mut Stack, from: &dyn Construct, on: &dyn Construct) -> Result<()> {
    let targets = on.node_ids(stack);
    for source in from.node_ids(stack) {
        for target in &targets {
            stack.add_dependency(&source, target)?;
        }
    }
    log::debug!("{} depends on {}", from.id(), on.id());
    Ok(())
}

/// `Name` tag carrying the construct path
pub(crate) fn name_tag(stack: &Stack, path: &str) -> Value {
    Value::List(vec![Value::map([
        ("key", Value::string("Name")),
        ("value", Value::string(stack.path(path))),
    ])])
}

/// A single value, or a list when there are several
pub(crate) fn one_or_many(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::List(values)
    }
}
