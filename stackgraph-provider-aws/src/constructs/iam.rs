//! IAM constructs: roles, principals, policies

use stackgraph_core::resource::{Resource, ResourceHandle, Value};
use stackgraph_core::stack::Stack;

use super::{Construct, Result, one_or_many};
use crate::schemas::iam;

const POLICY_VERSION: &str = "2012-10-17";

/// AWS service allowed to assume a role (e.g., "ecs-tasks.amazonaws.com")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePrincipal(pub String);

impl ServicePrincipal {
    pub fn new(service: impl Into<String>) -> Self {
        Self(service.into())
    }
}

/// Managed policy attached to a role by ARN
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedPolicy {
    pub arn: Value,
}

impl ManagedPolicy {
    /// An AWS managed policy, in the stack's partition
    pub fn from_aws_managed_policy_name(name: &str) -> Self {
        Self {
            arn: Value::join(
                "",
                vec![
                    Value::string("arn:"),
                    Value::pseudo("AWS::Partition"),
                    Value::string(format!(":iam::aws:policy/{}", name)),
                ],
            ),
        }
    }
}

/// Allow statement of an identity policy
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    pub fn allow<S: Into<String>>(
        actions: impl IntoIterator<Item = S>,
        resources: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().collect(),
        }
    }

    /// Policy document form; keys are written as the engine expects them
    pub fn to_value(&self) -> Value {
        Value::map([
            (
                "Action",
                one_or_many(self.actions.iter().map(Value::string).collect()),
            ),
            ("Effect", Value::string("Allow")),
            ("Resource", one_or_many(self.resources.clone())),
        ])
    }
}

/// Role construct properties
#[derive(Debug, Clone)]
pub struct RoleProps {
    pub assumed_by: ServicePrincipal,
    pub managed_policies: Vec<ManagedPolicy>,
    pub description: Option<String>,
}

/// An IAM role
///
/// Statements added with `add_to_policy` go to an inline default policy,
/// declared on first use as `<Role>DefaultPolicy`.
#[derive(Debug, Clone)]
pub struct Role {
    pub handle: ResourceHandle,
}

impl Role {
    pub fn new(stack: &mut Stack, id: &str, props: RoleProps) -> Result<Self> {
        let trust = Value::map([
            (
                "Statement",
                Value::List(vec![Value::map([
                    ("Action", Value::string("sts:AssumeRole")),
                    ("Effect", Value::string("Allow")),
                    (
                        "Principal",
                        Value::map([("Service", Value::string(props.assumed_by.0))]),
                    ),
                ])]),
            ),
            ("Version", Value::string(POLICY_VERSION)),
        ]);

        let mut resource =
            Resource::new(iam::ROLE, id).with_property("assume_role_policy_document", trust);
        if !props.managed_policies.is_empty() {
            resource.set_property(
                "managed_policy_arns",
                Value::List(props.managed_policies.into_iter().map(|p| p.arn).collect()),
            );
        }
        if let Some(description) = props.description {
            resource.set_property("description", description);
        }

        let handle = stack.add_resource(resource)?;
        Ok(Self { handle })
    }

    pub fn logical_id(&self) -> &str {
        self.handle.logical_id()
    }

    pub fn arn(&self) -> Value {
        self.handle.attr("Arn")
    }

    pub fn default_policy_id(&self) -> String {
        format!("{}DefaultPolicy", self.logical_id())
    }

    /// Append a statement to the role's default policy
    pub fn add_to_policy(&self, stack: &mut Stack, statement: PolicyStatement) -> Result<()> {
        let policy_id = self.default_policy_id();
        if stack.resource(&policy_id).is_none() {
            stack.add_resource(
                Resource::new(iam::POLICY, policy_id.as_str())
                    .with_property(
                        "policy_document",
                        Value::map([
                            ("Statement", Value::List(Vec::new())),
                            ("Version", Value::string(POLICY_VERSION)),
                        ]),
                    )
                    .with_property("policy_name", policy_id.as_str())
                    .with_property("roles", Value::List(vec![self.handle.reference()])),
            )?;
        }

        let policy = stack.resource_mut(&policy_id)?;
        if let Some(Value::Map(document)) = policy.properties.get_mut("policy_document")
            && let Some(Value::List(statements)) = document.get_mut("Statement")
        {
            statements.push(statement.to_value());
        }
        Ok(())
    }
}

impl Construct for Role {
    fn id(&self) -> &str {
        self.logical_id()
    }

    fn node_ids(&self, stack: &Stack) -> Vec<String> {
        let mut ids = vec![self.logical_id().to_string()];
        let policy_id = self.default_policy_id();
        if stack.resource(&policy_id).is_some() {
            ids.push(policy_id);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgraph_core::stack::Environment;

    fn task_role(stack: &mut Stack) -> Role {
        Role::new(
            stack,
            "TaskRole",
            RoleProps {
                assumed_by: ServicePrincipal::new("ecs-tasks.amazonaws.com"),
                managed_policies: vec![ManagedPolicy::from_aws_managed_policy_name(
                    "AmazonS3ReadOnlyAccess",
                )],
                description: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn trust_policy_names_the_service() {
        let mut stack = Stack::new("Test", Environment::default()).unwrap();
        task_role(&mut stack);

        let role = stack.resource("TaskRole").unwrap();
        let document = role.property("assume_role_policy_document").unwrap();
        let statement = &document.get("Statement").unwrap().as_list().unwrap()[0];
        assert_eq!(
            statement.get("Principal").and_then(|p| p.get("Service")),
            Some(&Value::string("ecs-tasks.amazonaws.com"))
        );
        let arns = role
            .property("managed_policy_arns")
            .and_then(Value::as_list)
            .unwrap();
        assert_eq!(arns.len(), 1);
    }

    #[test]
    fn statements_accumulate_in_default_policy() {
        let mut stack = Stack::new("Test", Environment::default()).unwrap();
        let role = task_role(&mut stack);
        assert_eq!(role.node_ids(&stack), vec!["TaskRole"]);

        role.add_to_policy(
            &mut stack,
            PolicyStatement::allow(["ecr:GetAuthorizationToken"], [Value::string("*")]),
        )
        .unwrap();
        role.add_to_policy(
            &mut stack,
            PolicyStatement::allow(
                ["logs:CreateLogStream", "logs:PutLogEvents"],
                [Value::get_att("Logs", "Arn")],
            ),
        )
        .unwrap();

        let policy = stack.resource("TaskRoleDefaultPolicy").unwrap();
        let statements = policy
            .property("policy_document")
            .and_then(|d| d.get("Statement"))
            .and_then(Value::as_list)
            .unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].get("Action"),
            Some(&Value::string("ecr:GetAuthorizationToken"))
        );
        let actions = statements[1].get("Action").and_then(Value::as_list);
        assert_eq!(actions.map(<[Value]>::len), Some(2));
        assert_eq!(
            role.node_ids(&stack),
            vec!["TaskRole", "TaskRoleDefaultPolicy"]
        );
    }
}
