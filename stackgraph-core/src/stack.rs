//! Stack - A named, independently deployable set of resource declarations
//!
//! Building a stack has no side effects. `validate` checks the two things the
//! provisioning engine needs before it can compute an apply order: every
//! reference resolves, and the dependency graph is acyclic.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::graph::{Dependency, DependencyGraph};
use crate::resource::{Resource, ResourceHandle, Value};

static LOGICAL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]{0,254}$").expect("valid regex"));

static STACK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("valid regex"));

/// Stack construction and validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StackError {
    #[error("Invalid stack name '{0}': use letters, digits and hyphens, starting with a letter")]
    InvalidStackName(String),

    #[error("Duplicate logical id: {0}")]
    DuplicateLogicalId(String),

    #[error("Invalid logical id '{0}': must be alphanumeric and start with a letter")]
    InvalidLogicalId(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Unresolved reference: {from} refers to '{target}', which is not declared")]
    UnresolvedReference { from: String, target: String },

    #[error("Cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
}

/// Account and region a stack is bound to
///
/// Unset fields leave the stack environment-agnostic; the engine fills them in
/// at deploy time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    pub fn new(account: Option<String>, region: Option<String>) -> Self {
        Self { account, region }
    }

    pub fn is_agnostic(&self) -> bool {
        self.account.is_none() && self.region.is_none()
    }

    /// Environment URI (e.g., "aws://123456789012/ap-south-1")
    pub fn uri(&self, scheme: &str) -> String {
        format!(
            "{}://{}/{}",
            scheme,
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }
}

/// Named stack output surfaced after a successful apply
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    pub value: Value,
    pub description: Option<String>,
}

/// Stack of resource declarations
#[derive(Debug, Clone, Default)]
pub struct Stack {
    name: String,
    environment: Environment,
    description: Option<String>,
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
    outputs: Vec<Output>,
}

impl Stack {
    /// Create an empty stack
    ///
    /// The name ends up in file names and in physical names derived from it,
    /// so it is held to the engine's stack name rules.
    pub fn new(name: impl Into<String>, environment: Environment) -> Result<Self, StackError> {
        let name = name.into();
        if !STACK_NAME.is_match(&name) {
            return Err(StackError::InvalidStackName(name));
        }
        Ok(Self {
            name,
            environment,
            ..Default::default()
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Resources in declaration order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Path of a child construct, used for descriptions and Name tags
    pub fn path(&self, id: &str) -> String {
        format!("{}/{}", self.name, id)
    }

    /// Declare a resource
    pub fn add_resource(&mut self, resource: Resource) -> Result<ResourceHandle, StackError> {
        let logical_id = resource.logical_id().to_string();
        if !LOGICAL_ID.is_match(&logical_id) {
            return Err(StackError::InvalidLogicalId(logical_id));
        }
        if self.index.contains_key(&logical_id) {
            return Err(StackError::DuplicateLogicalId(logical_id));
        }

        log::debug!("declare {}", resource.id);
        let handle = ResourceHandle::new(resource.id.clone());
        self.index.insert(logical_id, self.resources.len());
        self.resources.push(resource);
        Ok(handle)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.index.get(logical_id).map(|&i| &self.resources[i])
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Result<&mut Resource, StackError> {
        match self.index.get(logical_id) {
            Some(&i) => Ok(&mut self.resources[i]),
            None => Err(StackError::UnknownResource(logical_id.to_string())),
        }
    }

    /// Remove a resource; references to it are left dangling
    pub fn remove_resource(&mut self, logical_id: &str) -> Option<Resource> {
        let i = self.index.remove(logical_id)?;
        let removed = self.resources.remove(i);
        for pos in self.index.values_mut() {
            if *pos > i {
                *pos -= 1;
            }
        }
        Some(removed)
    }

    /// Declare that `from` must be created after `to`
    ///
    /// `to` is not checked here; `validate` reports it if it never appears.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), StackError> {
        let resource = self.resource_mut(from)?;
        resource.depends_on.insert(to.to_string());
        Ok(())
    }

    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        value: Value,
        description: Option<String>,
    ) -> Result<(), StackError> {
        let name = name.into();
        if !LOGICAL_ID.is_match(&name) {
            return Err(StackError::InvalidLogicalId(name));
        }
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(StackError::DuplicateLogicalId(name));
        }
        self.outputs.push(Output {
            name,
            value,
            description,
        });
        Ok(())
    }

    /// Build the dependency graph from property references and explicit edges
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for resource in &self.resources {
            graph.add_node(resource.logical_id());
        }
        for resource in &self.resources {
            for (key, value) in &resource.properties {
                for target in value.references() {
                    graph.add_edge(resource.logical_id(), Dependency::reference(target, key));
                }
            }
            for target in &resource.depends_on {
                graph.add_edge(resource.logical_id(), Dependency::explicit(target));
            }
        }
        graph
    }

    /// Check that every reference resolves and the graph is acyclic
    pub fn validate(&self) -> Result<DependencyGraph, StackError> {
        for resource in &self.resources {
            for target in resource.dependencies() {
                if !self.index.contains_key(&target) {
                    return Err(StackError::UnresolvedReference {
                        from: resource.logical_id().to_string(),
                        target,
                    });
                }
            }
        }
        for output in &self.outputs {
            for target in output.value.references() {
                if !self.index.contains_key(&target) {
                    return Err(StackError::UnresolvedReference {
                        from: output.name.clone(),
                        target,
                    });
                }
            }
        }

        let graph = self.dependency_graph();
        if let Some(cycle) = graph.find_cycle() {
            return Err(StackError::CyclicDependency { cycle });
        }
        Ok(graph)
    }
}
