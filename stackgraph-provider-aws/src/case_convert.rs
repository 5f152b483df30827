//! Case conversion between construct attribute names and CloudFormation names
//!
//! Constructs use snake_case (e.g., `cidr_block`, `security_group_ingress`)
//! CloudFormation uses PascalCase (e.g., `CidrBlock`, `SecurityGroupIngress`)
//!
//! Acronyms CloudFormation spells in capitals (`DBSubnetGroupName`) are not
//! derivable from snake_case; schemas carry those as explicit provider names.

use heck::{ToSnakeCase, ToUpperCamelCase};

/// Convert snake_case to PascalCase
/// e.g., "cidr_block" -> "CidrBlock"
pub fn to_pascal_case(s: &str) -> String {
    s.to_upper_camel_case()
}

/// Convert PascalCase to snake_case
/// e.g., "CidrBlock" -> "cidr_block"
pub fn to_snake_case(s: &str) -> String {
    s.to_snake_case()
}
