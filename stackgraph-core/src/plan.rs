//! Plan - Collection of Effects
//!
//! A Plan is the ordered list of Effects the provisioning engine would perform
//! for a stack, derived from the dependency graph alone. It does not look at
//! live infrastructure.

use crate::effect::Effect;
use crate::resource::RemovalPolicy;
use crate::stack::{Stack, StackError};

/// Plan containing Effects in execution order
#[derive(Debug, Clone, Default)]
pub struct Plan {
    effects: Vec<Effect>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan for creating every resource, dependencies first
    pub fn deploy(stack: &Stack) -> Result<Self, StackError> {
        let mut plan = Plan::new();
        for id in ordered_ids(stack)? {
            if let Some(resource) = stack.resource(&id) {
                plan.add(Effect::Create(resource.id.clone()));
            }
        }
        Ok(plan)
    }

    /// Plan for tearing the stack down, dependents first
    ///
    /// Resources with a retain policy are kept rather than deleted.
    pub fn destroy(stack: &Stack) -> Result<Self, StackError> {
        let mut plan = Plan::new();
        for id in ordered_ids(stack)?.into_iter().rev() {
            if let Some(resource) = stack.resource(&id) {
                let effect = match resource.removal_policy {
                    Some(RemovalPolicy::Retain) => Effect::Retain(resource.id.clone()),
                    _ => Effect::Delete(resource.id.clone()),
                };
                plan.add(effect);
            }
        }
        Ok(plan)
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Position of a resource's effect in the plan
    pub fn position(&self, logical_id: &str) -> Option<usize> {
        self.effects
            .iter()
            .position(|e| e.resource_id().name == logical_id)
    }

    /// Number of mutating Effects
    pub fn mutation_count(&self) -> usize {
        self.effects.iter().filter(|e| e.is_mutating()).count()
    }

    /// Generate a summary of the Plan for display
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for effect in &self.effects {
            match effect {
                Effect::Create(_) => summary.create += 1,
                Effect::Delete(_) => summary.delete += 1,
                Effect::Retain(_) => summary.retain += 1,
            }
        }
        summary
    }
}

fn ordered_ids(stack: &Stack) -> Result<Vec<String>, StackError> {
    let graph = stack.validate()?;
    graph
        .topological_order()
        .map_err(|cycle| StackError::CyclicDependency { cycle })
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub delete: usize,
    pub retain: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to delete, {} to retain",
            self.create, self.delete, self.retain
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, Value};
    use crate::stack::Environment;

    fn stack() -> Stack {
        let mut stack = Stack::new("Test", Environment::default()).unwrap();
        stack
            .add_resource(
                Resource::new("AWS::ECS::Service", "Service")
                    .with_property("cluster", Value::reference("Cluster")),
            )
            .unwrap();
        stack
            .add_resource(Resource::new("AWS::ECS::Cluster", "Cluster"))
            .unwrap();
        stack
            .add_resource(
                Resource::new("AWS::RDS::DBCluster", "Database")
                    .with_removal_policy(RemovalPolicy::Destroy),
            )
            .unwrap();
        stack
            .add_resource(
                Resource::new("AWS::S3::Bucket", "Assets")
                    .with_removal_policy(RemovalPolicy::Retain),
            )
            .unwrap();
        stack.add_dependency("Service", "Database").unwrap();
        stack
    }

    #[test]
    fn empty_plan() {
        let plan = Plan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.mutation_count(), 0);
    }

    #[test]
    fn deploy_creates_dependencies_first() {
        let plan = Plan::deploy(&stack()).unwrap();

        assert_eq!(plan.effects().len(), 4);
        assert_eq!(plan.summary().create, 4);
        let service = plan.position("Service").unwrap();
        assert!(plan.position("Cluster").unwrap() < service);
        assert!(plan.position("Database").unwrap() < service);
    }

    #[test]
    fn destroy_deletes_dependents_first_and_keeps_retained() {
        let plan = Plan::destroy(&stack()).unwrap();

        let service = plan.position("Service").unwrap();
        assert!(service < plan.position("Database").unwrap());
        assert!(service < plan.position("Cluster").unwrap());

        let summary = plan.summary();
        assert_eq!(
            summary,
            PlanSummary {
                create: 0,
                delete: 3,
                retain: 1
            }
        );
        assert_eq!(plan.mutation_count(), 3);
        assert_eq!(
            summary.to_string(),
            "Plan: 0 to create, 3 to delete, 1 to retain"
        );
    }

    #[test]
    fn invalid_stack_has_no_plan() {
        let mut stack = stack();
        stack.remove_resource("Cluster");
        assert!(matches!(
            Plan::deploy(&stack),
            Err(StackError::UnresolvedReference { .. })
        ));
    }
}
