//! ECS constructs: cluster, Fargate task definition and service

use std::fmt;

use stackgraph_core::resource::{Resource, ResourceHandle, Value};
use stackgraph_core::stack::Stack;

use super::ec2::{SecurityGroup, SubnetType, Vpc};
use super::elbv2::LoadBalancerTarget;
use super::iam::{PolicyStatement, Role};
use super::logs::{LogGroup, LogGroupProps};
use super::{Construct, ConstructError, Result};
use crate::schemas::ecs;
use crate::types::validate_fargate_size;

/// An ECS cluster
#[derive(Debug, Clone)]
pub struct Cluster {
    pub handle: ResourceHandle,
}

impl Cluster {
    pub fn new(stack: &mut Stack, id: &str) -> Result<Self> {
        let handle = stack.add_resource(Resource::new(ecs::CLUSTER, id))?;
        Ok(Self { handle })
    }

    pub fn arn(&self) -> Value {
        self.handle.attr("Arn")
    }
}

/// CPU architecture of a Fargate task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuArchitecture {
    #[default]
    X86_64,
    Arm64,
}

impl fmt::Display for CpuArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuArchitecture::X86_64 => write!(f, "X86_64"),
            CpuArchitecture::Arm64 => write!(f, "ARM64"),
        }
    }
}

/// Fargate task definition construct properties
#[derive(Debug, Clone)]
pub struct FargateTaskDefinitionProps {
    /// CPU units (256 = 0.25 vCPU)
    pub cpu: u32,
    pub memory_mib: u32,
    pub cpu_architecture: CpuArchitecture,
    pub task_role: Option<Role>,
    pub execution_role: Option<Role>,
}

/// Container log driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDriver {
    /// Ship stdout/stderr to a new CloudWatch log group
    AwsLogs { stream_prefix: String },
}

impl LogDriver {
    pub fn aws_logs(stream_prefix: impl Into<String>) -> Self {
        LogDriver::AwsLogs {
            stream_prefix: stream_prefix.into(),
        }
    }
}

/// Secret injected into a container's environment
#[derive(Debug, Clone, PartialEq)]
pub struct Secret {
    pub arn: Value,
    pub field: Option<String>,
}

impl Secret {
    /// A Secrets Manager secret, or one JSON field of it
    pub fn from_secrets_manager(secret: &ResourceHandle, field: Option<&str>) -> Self {
        Self {
            arn: secret.reference(),
            field: field.map(str::to_string),
        }
    }

    fn value_from(&self) -> Value {
        match &self.field {
            Some(field) => Value::join(
                "",
                vec![self.arn.clone(), Value::string(format!(":{}::", field))],
            ),
            None => self.arn.clone(),
        }
    }
}

/// Container port mapping (TCP)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
}

/// Options of `FargateTaskDefinition::add_container`
#[derive(Debug, Clone)]
pub struct ContainerDefinitionOptions {
    pub image: String,
    pub logging: Option<LogDriver>,
    /// Environment variables, in declaration order
    pub environment: Vec<(String, Value)>,
    pub secrets: Vec<(String, Secret)>,
    pub port_mappings: Vec<PortMapping>,
    pub essential: bool,
}

impl ContainerDefinitionOptions {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            logging: None,
            environment: Vec::new(),
            secrets: Vec::new(),
            port_mappings: Vec::new(),
            essential: true,
        }
    }
}

/// A container added to a task definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDefinition {
    pub name: String,
    pub port_mappings: Vec<PortMapping>,
}

/// A Fargate task definition
///
/// Containers are appended with `add_container`. Log groups and secrets a
/// container uses are granted to the execution role.
#[derive(Debug, Clone)]
pub struct FargateTaskDefinition {
    pub handle: ResourceHandle,
    execution_role: Option<Role>,
    containers: Vec<ContainerDefinition>,
}

impl FargateTaskDefinition {
    pub fn new(stack: &mut Stack, id: &str, props: FargateTaskDefinitionProps) -> Result<Self> {
        validate_fargate_size(props.cpu, props.memory_mib)
            .map_err(|e| ConstructError::invalid(id, e))?;

        let mut resource = Resource::new(ecs::TASK_DEFINITION, id)
            .with_property("family", format!("{}{}", stack.name(), id))
            .with_property("cpu", props.cpu.to_string())
            .with_property("memory", props.memory_mib.to_string())
            .with_property("network_mode", "awsvpc")
            .with_property(
                "requires_compatibilities",
                Value::List(vec![Value::string("FARGATE")]),
            )
            .with_property(
                "runtime_platform",
                Value::map([
                    ("cpu_architecture", Value::string(props.cpu_architecture.to_string())),
                    ("operating_system_family", Value::string("LINUX")),
                ]),
            );
        if let Some(role) = &props.task_role {
            resource.set_property("task_role_arn", role.arn());
        }
        if let Some(role) = &props.execution_role {
            resource.set_property("execution_role_arn", role.arn());
        }

        let handle = stack.add_resource(resource)?;
        Ok(Self {
            handle,
            execution_role: props.execution_role,
            containers: Vec::new(),
        })
    }

    pub fn logical_id(&self) -> &str {
        self.handle.logical_id()
    }

    pub fn containers(&self) -> &[ContainerDefinition] {
        &self.containers
    }

    pub fn container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// Append a container definition
    pub fn add_container(
        &mut self,
        stack: &mut Stack,
        id: &str,
        options: ContainerDefinitionOptions,
    ) -> Result<ContainerDefinition> {
        if self.container(id).is_some() {
            return Err(ConstructError::invalid(
                self.logical_id(),
                format!("container '{}' is already defined", id),
            ));
        }

        let mut definition = vec![
            ("name", Value::string(id)),
            ("image", Value::string(options.image.as_str())),
            ("essential", Value::Bool(options.essential)),
        ];

        if !options.environment.is_empty() {
            let environment = options
                .environment
                .iter()
                .map(|(name, value)| {
                    Value::map([
                        ("name", Value::string(name.as_str())),
                        ("value", value.clone()),
                    ])
                })
                .collect();
            definition.push(("environment", Value::List(environment)));
        }

        if !options.secrets.is_empty() {
            let mut secrets = Vec::new();
            for (name, secret) in &options.secrets {
                secrets.push(Value::map([
                    ("name", Value::string(name.as_str())),
                    ("value_from", secret.value_from()),
                ]));
                self.grant_execution(
                    stack,
                    PolicyStatement::allow(
                        [
                            "secretsmanager:DescribeSecret",
                            "secretsmanager:GetSecretValue",
                        ],
                        [secret.arn.clone()],
                    ),
                )?;
            }
            definition.push(("secrets", Value::List(secrets)));
        }

        if !options.port_mappings.is_empty() {
            let mappings = options
                .port_mappings
                .iter()
                .map(|m| {
                    Value::map([
                        ("container_port", Value::from(m.container_port)),
                        ("protocol", Value::string("tcp")),
                    ])
                })
                .collect();
            definition.push(("port_mappings", Value::List(mappings)));
        }

        if let Some(LogDriver::AwsLogs { stream_prefix }) = &options.logging {
            let log_group = LogGroup::new(
                stack,
                &format!("{}{}LogGroup", self.logical_id(), id),
                LogGroupProps {
                    retention_days: None,
                    ..Default::default()
                },
            )?;
            definition.push((
                "log_configuration",
                Value::map([
                    ("log_driver", Value::string("awslogs")),
                    (
                        "options",
                        Value::map([
                            ("awslogs-group", log_group.name()),
                            ("awslogs-region", Value::pseudo("AWS::Region")),
                            ("awslogs-stream-prefix", Value::string(stream_prefix.as_str())),
                        ]),
                    ),
                ]),
            ));
            self.grant_execution(
                stack,
                PolicyStatement::allow(
                    ["logs:CreateLogStream", "logs:PutLogEvents"],
                    [log_group.arn()],
                ),
            )?;
        }

        stack
            .resource_mut(self.logical_id())?
            .append_property("container_definitions", Value::map(definition));

        let container = ContainerDefinition {
            name: id.to_string(),
            port_mappings: options.port_mappings,
        };
        self.containers.push(container.clone());
        Ok(container)
    }

    fn grant_execution(&self, stack: &mut Stack, statement: PolicyStatement) -> Result<()> {
        match &self.execution_role {
            Some(role) => role.add_to_policy(stack, statement),
            None => Err(ConstructError::invalid(
                self.logical_id(),
                "an execution role is required for log groups and secrets",
            )),
        }
    }
}

/// Deployment controller of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentController {
    #[default]
    Ecs,
    CodeDeploy,
    External,
}

impl DeploymentController {
    fn as_str(&self) -> &'static str {
        match self {
            DeploymentController::Ecs => "ECS",
            DeploymentController::CodeDeploy => "CODE_DEPLOY",
            DeploymentController::External => "EXTERNAL",
        }
    }
}

/// Fargate service construct properties
#[derive(Debug, Clone)]
pub struct FargateServiceProps<'a> {
    pub cluster: &'a Cluster,
    pub task_definition: &'a FargateTaskDefinition,
    pub desired_count: u32,
    pub security_groups: Vec<SecurityGroup>,
    pub subnet_type: SubnetType,
    pub assign_public_ip: bool,
    pub deployment_controller: DeploymentController,
}

/// A Fargate service
#[derive(Debug, Clone)]
pub struct FargateService {
    pub handle: ResourceHandle,
    task_definition: String,
    containers: Vec<ContainerDefinition>,
    security_groups: Vec<SecurityGroup>,
}

impl FargateService {
    pub fn new(
        stack: &mut Stack,
        id: &str,
        vpc: &Vpc,
        props: FargateServiceProps<'_>,
    ) -> Result<Self> {
        if props.task_definition.containers().is_empty() {
            return Err(ConstructError::invalid(
                id,
                format!(
                    "task definition {} has no containers",
                    props.task_definition.logical_id()
                ),
            ));
        }

        let assign_public_ip = if props.assign_public_ip {
            "ENABLED"
        } else {
            "DISABLED"
        };
        let resource = Resource::new(ecs::SERVICE, id)
            .with_property("cluster", props.cluster.handle.reference())
            .with_property("task_definition", props.task_definition.handle.reference())
            .with_property("desired_count", props.desired_count)
            .with_property("launch_type", "FARGATE")
            .with_property("enable_ecs_managed_tags", false)
            .with_property(
                "deployment_configuration",
                Value::map([
                    ("maximum_percent", Value::Int(200)),
                    ("minimum_healthy_percent", Value::Int(50)),
                ]),
            )
            .with_property(
                "deployment_controller",
                Value::map([("type", Value::string(props.deployment_controller.as_str()))]),
            )
            .with_property(
                "network_configuration",
                Value::map([(
                    "awsvpc_configuration",
                    Value::map([
                        ("assign_public_ip", Value::string(assign_public_ip)),
                        (
                            "security_groups",
                            SecurityGroup::group_ids(&props.security_groups),
                        ),
                        ("subnets", vpc.subnet_ids(props.subnet_type)),
                    ]),
                )]),
            );

        let handle = stack.add_resource(resource)?;
        Ok(Self {
            handle,
            task_definition: props.task_definition.logical_id().to_string(),
            containers: props.task_definition.containers().to_vec(),
            security_groups: props.security_groups,
        })
    }

    pub fn logical_id(&self) -> &str {
        self.handle.logical_id()
    }

    /// Target for a load balancer, pointing at one container port
    ///
    /// The port must be one of the container's port mappings.
    pub fn load_balancer_target(
        &self,
        container_name: &str,
        container_port: u16,
    ) -> Result<LoadBalancerTarget> {
        let container = self
            .containers
            .iter()
            .find(|c| c.name == container_name)
            .ok_or_else(|| ConstructError::UnknownContainer {
                task_definition: self.task_definition.clone(),
                container: container_name.to_string(),
            })?;
        if !container
            .port_mappings
            .iter()
            .any(|m| m.container_port == container_port)
        {
            return Err(ConstructError::UnmappedPort {
                container: container_name.to_string(),
                port: container_port,
            });
        }

        Ok(LoadBalancerTarget {
            service: self.logical_id().to_string(),
            container_name: container_name.to_string(),
            container_port,
            security_groups: self.security_groups.clone(),
        })
    }
}

impl Construct for FargateService {
    fn id(&self) -> &str {
        self.logical_id()
    }

    fn node_ids(&self, _stack: &Stack) -> Vec<String> {
        vec![self.logical_id().to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructs::ec2::{SecurityGroupProps, VpcProps};
    use crate::constructs::iam::{RoleProps, ServicePrincipal};
    use stackgraph_core::stack::Environment;

    struct Fixture {
        stack: Stack,
        vpc: Vpc,
        cluster: Cluster,
        task_definition: FargateTaskDefinition,
        group: SecurityGroup,
    }

    fn fixture() -> Fixture {
        let mut stack = Stack::new("Test", Environment::default()).unwrap();
        let vpc = Vpc::new(
            &mut stack,
            "Network",
            VpcProps {
                max_azs: 2,
                ..Default::default()
            },
        )
        .unwrap();
        let group =
            SecurityGroup::new(&mut stack, "Svc", &vpc, SecurityGroupProps::default()).unwrap();
        let cluster = Cluster::new(&mut stack, "Cluster").unwrap();
        let execution_role = Role::new(
            &mut stack,
            "ExecRole",
            RoleProps {
                assumed_by: ServicePrincipal::new("ecs-tasks.amazonaws.com"),
                managed_policies: Vec::new(),
                description: None,
            },
        )
        .unwrap();
        let task_definition = FargateTaskDefinition::new(
            &mut stack,
            "TaskDef",
            FargateTaskDefinitionProps {
                cpu: 512,
                memory_mib: 1024,
                cpu_architecture: CpuArchitecture::Arm64,
                task_role: None,
                execution_role: Some(execution_role),
            },
        )
        .unwrap();
        Fixture {
            stack,
            vpc,
            cluster,
            task_definition,
            group,
        }
    }

    fn web_container() -> ContainerDefinitionOptions {
        ContainerDefinitionOptions {
            logging: Some(LogDriver::aws_logs("Web")),
            environment: vec![
                ("PORT".to_string(), Value::string("7007")),
                ("HOST".to_string(), Value::get_att("Db", "Endpoint.Address")),
            ],
            secrets: vec![(
                "PASSWORD".to_string(),
                Secret::from_secrets_manager(
                    &ResourceHandle::new(stackgraph_core::resource::ResourceId::new(
                        "AWS::SecretsManager::Secret",
                        "DbSecret",
                    )),
                    Some("password"),
                ),
            )],
            port_mappings: vec![PortMapping {
                container_port: 7007,
            }],
            ..ContainerDefinitionOptions::new("registry/web")
        }
    }

    #[test]
    fn task_definition_size_is_checked() {
        let mut stack = Stack::new("Test", Environment::default()).unwrap();
        let result = FargateTaskDefinition::new(
            &mut stack,
            "TaskDef",
            FargateTaskDefinitionProps {
                cpu: 512,
                memory_mib: 512,
                cpu_architecture: CpuArchitecture::default(),
                task_role: None,
                execution_role: None,
            },
        );
        assert!(matches!(
            result,
            Err(ConstructError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn container_with_logs_and_secret() {
        let Fixture {
            mut stack,
            mut task_definition,
            ..
        } = fixture();
        task_definition
            .add_container(&mut stack, "web", web_container())
            .unwrap();

        let resource = stack.resource("TaskDef").unwrap();
        assert_eq!(resource.property("cpu"), Some(&Value::string("512")));
        assert_eq!(resource.property("family"), Some(&Value::string("TestTaskDef")));
        let container = &resource
            .property("container_definitions")
            .and_then(Value::as_list)
            .unwrap()[0];
        let environment = container
            .get("environment")
            .and_then(Value::as_list)
            .unwrap();
        assert_eq!(environment[0].get("name"), Some(&Value::string("PORT")));
        assert_eq!(
            container
                .get("log_configuration")
                .and_then(|l| l.get("options"))
                .and_then(|o| o.get("awslogs-group")),
            Some(&Value::reference("TaskDefwebLogGroup"))
        );

        let log_group = stack.resource("TaskDefwebLogGroup").unwrap();
        assert!(log_group.is_retained());
        assert!(log_group.property("retention_in_days").is_none());

        let policy = stack.resource("ExecRoleDefaultPolicy").unwrap();
        let statements = policy
            .property("policy_document")
            .and_then(|d| d.get("Statement"))
            .and_then(Value::as_list)
            .unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn duplicate_container_is_rejected() {
        let Fixture {
            mut stack,
            mut task_definition,
            ..
        } = fixture();
        task_definition
            .add_container(&mut stack, "web", ContainerDefinitionOptions::new("a"))
            .unwrap();
        assert!(
            task_definition
                .add_container(&mut stack, "web", ContainerDefinitionOptions::new("b"))
                .is_err()
        );
    }

    #[test]
    fn logs_need_an_execution_role() {
        let mut stack = Stack::new("Test", Environment::default()).unwrap();
        let mut task_definition = FargateTaskDefinition::new(
            &mut stack,
            "TaskDef",
            FargateTaskDefinitionProps {
                cpu: 256,
                memory_mib: 512,
                cpu_architecture: CpuArchitecture::X86_64,
                task_role: None,
                execution_role: None,
            },
        )
        .unwrap();
        let options = ContainerDefinitionOptions {
            logging: Some(LogDriver::aws_logs("Web")),
            ..ContainerDefinitionOptions::new("registry/web")
        };
        let added = task_definition.add_container(&mut stack, "web", options);
        assert!(added.is_err());
    }

    #[test]
    fn load_balancer_target_checks_port_mapping() {
        let Fixture {
            mut stack,
            vpc,
            cluster,
            mut task_definition,
            group,
        } = fixture();
        task_definition
            .add_container(&mut stack, "web", web_container())
            .unwrap();
        let service = FargateService::new(
            &mut stack,
            "Service",
            &vpc,
            FargateServiceProps {
                cluster: &cluster,
                task_definition: &task_definition,
                desired_count: 1,
                security_groups: vec![group],
                subnet_type: SubnetType::PrivateWithEgress,
                assign_public_ip: false,
                deployment_controller: DeploymentController::Ecs,
            },
        )
        .unwrap();

        let target = service.load_balancer_target("web", 7007).unwrap();
        assert_eq!(target.container_port, 7007);
        assert_eq!(target.security_groups[0].logical_id(), "Svc");
        assert!(matches!(
            service.load_balancer_target("web", 8080),
            Err(ConstructError::UnmappedPort { port: 8080, .. })
        ));
        assert!(matches!(
            service.load_balancer_target("worker", 7007),
            Err(ConstructError::UnknownContainer { .. })
        ));

        let resource = stack.resource("Service").unwrap();
        assert_eq!(
            resource
                .property("network_configuration")
                .and_then(|n| n.get("awsvpc_configuration"))
                .and_then(|a| a.get("assign_public_ip")),
            Some(&Value::string("DISABLED"))
        );
    }

    #[test]
    fn service_needs_a_container() {
        let Fixture {
            mut stack,
            vpc,
            cluster,
            task_definition,
            group,
        } = fixture();
        let result = FargateService::new(
            &mut stack,
            "Service",
            &vpc,
            FargateServiceProps {
                cluster: &cluster,
                task_definition: &task_definition,
                desired_count: 1,
                security_groups: vec![group],
                subnet_type: SubnetType::PrivateWithEgress,
                assign_public_ip: false,
                deployment_controller: DeploymentController::default(),
            },
        );
        assert!(result.is_err());
    }
}
