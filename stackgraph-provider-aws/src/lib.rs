//! AWS Provider
//!
//! CloudFormation resource types, their schemas, and the constructs that
//! compose them into higher-level building blocks.

pub mod case_convert;
pub mod constructs;
pub mod resources;
pub mod schemas;
pub mod types;

use stackgraph_core::provider::{Provider, ResourceType};

/// AWS Provider
///
/// Attribute names without an explicit provider name are converted from
/// snake_case to PascalCase.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsProvider;

impl AwsProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resources::resource_types()
    }

    fn property_name(&self, attribute: &str) -> String {
        case_convert::to_pascal_case(attribute)
    }
}
