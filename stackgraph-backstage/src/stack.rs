//! The Backstage stack definition

use stackgraph_core::resource::{RemovalPolicy, Value};
use stackgraph_core::stack::{Environment, Stack};
use stackgraph_provider_aws::constructs::ec2::{
    DEFAULT_VPC_CIDR, Peer, Port, SecurityGroup, SecurityGroupProps, SubnetType, Vpc, VpcProps,
};
use stackgraph_provider_aws::constructs::ecs::{
    Cluster, ContainerDefinitionOptions, CpuArchitecture, DeploymentController, FargateService,
    FargateServiceProps, FargateTaskDefinition, FargateTaskDefinitionProps, LogDriver, PortMapping,
    Secret,
};
use stackgraph_provider_aws::constructs::elbv2::{
    AddTargetsProps, ApplicationLoadBalancer, ApplicationLoadBalancerProps, HealthCheck,
    ListenerProps,
};
use stackgraph_provider_aws::constructs::iam::{
    ManagedPolicy, PolicyStatement, Role, RoleProps, ServicePrincipal,
};
use stackgraph_provider_aws::constructs::rds::{
    ClusterEngine, Credentials, DatabaseCluster, DatabaseClusterProps,
};
use stackgraph_provider_aws::constructs::s3::{Bucket, BucketProps};
use stackgraph_provider_aws::constructs::{self, ConstructError};

use crate::props::{Architecture, BackstageProps};

pub const DEFAULT_STACK_NAME: &str = "BackstageEcsStack";
pub const CONTAINER_NAME: &str = "BackstageContainer";
pub const OUTPUT_LOAD_BALANCER_DNS: &str = "LoadBalancerDNS";

const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";
const POSTGRES_PORT: u16 = 5432;

/// Actions the execution role needs to pull the image from ECR
const ECR_PULL_ACTIONS: [&str; 4] = [
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];

/// Build the Backstage stack
///
/// Construction declares resources only; nothing is deployed.
pub fn backstage_stack(
    name: &str,
    environment: Environment,
    props: &BackstageProps,
) -> Result<Stack, ConstructError> {
    props
        .validate()
        .map_err(|e| ConstructError::invalid(name, e.to_string()))?;

    let mut stack = Stack::new(name, environment)?
        .with_description("Backstage developer portal on ECS Fargate with Aurora PostgreSQL");

    // Network
    let vpc = Vpc::new(
        &mut stack,
        "BackstageVpc",
        VpcProps {
            cidr: DEFAULT_VPC_CIDR.to_string(),
            max_azs: props.max_azs,
        },
    )?;

    // Security groups
    let ecs_sg = SecurityGroup::new(
        &mut stack,
        "EcsSecurityGroup",
        &vpc,
        SecurityGroupProps::default(),
    )?;
    let alb_sg = SecurityGroup::new(
        &mut stack,
        "ALBSecurityGroup",
        &vpc,
        SecurityGroupProps::default(),
    )?;
    alb_sg.add_ingress_rule(
        &mut stack,
        Peer::any_ipv4(),
        Port::tcp(props.listener_port),
        "Allow HTTP",
    )?;
    let rds_sg = SecurityGroup::new(
        &mut stack,
        "RdsSecurityGroup",
        &vpc,
        SecurityGroupProps::default(),
    )?;
    rds_sg.add_ingress_rule(
        &mut stack,
        Peer::security_group(&ecs_sg),
        Port::tcp(POSTGRES_PORT),
        "Allow ECS to connect to RDS",
    )?;

    // Load balancer
    let alb = ApplicationLoadBalancer::new(
        &mut stack,
        "CustomALB",
        &vpc,
        ApplicationLoadBalancerProps {
            internet_facing: true,
            security_group: alb_sg,
        },
    )?;
    let listener = alb.add_listener(
        &mut stack,
        "ALBListener",
        ListenerProps {
            port: props.listener_port,
            open: true,
        },
    )?;

    let cluster = Cluster::new(&mut stack, "BackstageCluster")?;

    let bucket = Bucket::new(&mut stack, "BackstageAssets", BucketProps::default())?;

    let database = DatabaseCluster::new(
        &mut stack,
        "BackstageAuroraDB",
        &vpc,
        DatabaseClusterProps {
            engine: ClusterEngine::aurora_postgres(props.engine_version.as_str()),
            credentials: Credentials::from_generated_secret(props.database_username.as_str()),
            default_database_name: Some(props.database_name.clone()),
            instance_class: props.instance_class.clone(),
            instances: props.database_instances,
            security_groups: vec![rds_sg],
            serverless_v2_min_capacity: props.min_capacity,
            serverless_v2_max_capacity: props.max_capacity,
            removal_policy: RemovalPolicy::Destroy,
        },
    )?;

    // IAM
    let task_role = Role::new(
        &mut stack,
        "BackstageTaskRole",
        RoleProps {
            assumed_by: ServicePrincipal::new(ECS_TASKS_PRINCIPAL),
            managed_policies: vec![ManagedPolicy::from_aws_managed_policy_name(
                "AmazonS3ReadOnlyAccess",
            )],
            description: None,
        },
    )?;
    let execution_role = Role::new(
        &mut stack,
        "BackstageTaskExecutionRole",
        RoleProps {
            assumed_by: ServicePrincipal::new(ECS_TASKS_PRINCIPAL),
            managed_policies: Vec::new(),
            description: None,
        },
    )?;
    execution_role.add_to_policy(
        &mut stack,
        PolicyStatement::allow(ECR_PULL_ACTIONS, [Value::string("*")]),
    )?;

    // Task definition and container
    let mut task_definition = FargateTaskDefinition::new(
        &mut stack,
        "BackstageTaskDef",
        FargateTaskDefinitionProps {
            cpu: props.cpu,
            memory_mib: props.memory_mib,
            cpu_architecture: match props.architecture {
                Architecture::X86_64 => CpuArchitecture::X86_64,
                Architecture::Arm64 => CpuArchitecture::Arm64,
            },
            task_role: Some(task_role),
            execution_role: Some(execution_role),
        },
    )?;
    task_definition.add_container(
        &mut stack,
        CONTAINER_NAME,
        ContainerDefinitionOptions {
            logging: Some(LogDriver::aws_logs(props.log_stream_prefix.as_str())),
            environment: vec![
                ("POSTGRES_HOST".to_string(), database.endpoint_address()),
                (
                    "POSTGRES_USER".to_string(),
                    Value::string(props.database_username.as_str()),
                ),
                ("POSTGRES_PORT".to_string(), database.endpoint_port()),
                ("AWS_S3_BUCKET".to_string(), bucket.bucket_name()),
                (
                    "BASE_URL".to_string(),
                    Value::join("", vec![Value::string("http://"), alb.dns_name()]),
                ),
            ],
            secrets: vec![(
                "POSTGRES_PASSWORD".to_string(),
                Secret::from_secrets_manager(database.secret(), Some("password")),
            )],
            port_mappings: vec![PortMapping {
                container_port: props.container_port,
            }],
            ..ContainerDefinitionOptions::new(props.image.as_str())
        },
    )?;

    // Service
    let service = FargateService::new(
        &mut stack,
        "BackstageService",
        &vpc,
        FargateServiceProps {
            cluster: &cluster,
            task_definition: &task_definition,
            desired_count: props.desired_count,
            security_groups: vec![ecs_sg],
            subnet_type: SubnetType::PrivateWithEgress,
            assign_public_ip: false,
            deployment_controller: DeploymentController::Ecs,
        },
    )?;

    listener.add_targets(
        &mut stack,
        "ECS",
        AddTargetsProps {
            port: props.listener_port,
            targets: vec![service.load_balancer_target(CONTAINER_NAME, props.container_port)?],
            health_check: HealthCheck {
                path: "/".to_string(),
                interval_seconds: 30,
                timeout_seconds: 5,
                healthy_threshold_count: 2,
                unhealthy_threshold_count: 5,
            },
        },
    )?;

    // The database must be up before the first task starts
    constructs::add_dependency(&mut stack, &service, &database)?;

    stack.add_output(
        OUTPUT_LOAD_BALANCER_DNS,
        alb.dns_name(),
        Some("Public DNS name of the load balancer".to_string()),
    )?;

    log::info!(
        "built stack {} ({} resources)",
        stack.name(),
        stack.resources().len()
    );
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackgraph_core::plan::Plan;
    use stackgraph_core::stack::StackError;
    use stackgraph_core::synth::{SynthError, Synthesizer};
    use stackgraph_provider_aws::AwsProvider;
    use stackgraph_provider_aws::schemas::ec2::SECURITY_GROUP_INGRESS;

    fn build() -> Stack {
        backstage_stack(
            DEFAULT_STACK_NAME,
            Environment::new(
                Some("123456789012".to_string()),
                Some("ap-south-1".to_string()),
            ),
            &BackstageProps::default(),
        )
        .unwrap()
    }

    fn ids(stack: &Stack) -> Vec<String> {
        stack
            .resources()
            .iter()
            .map(|r| r.logical_id().to_string())
            .collect()
    }

    #[test]
    fn building_twice_is_identical() {
        let first = build();
        let second = build();
        assert_eq!(ids(&first), ids(&second));

        let graph_a = first.dependency_graph();
        let graph_b = second.dependency_graph();
        for id in ids(&first) {
            assert_eq!(graph_a.dependencies_of(&id), graph_b.dependencies_of(&id));
        }

        let synth = Synthesizer::new(AwsProvider);
        let a = synth.synthesize(&first).unwrap().to_json_pretty().unwrap();
        let b = synth.synthesize(&second).unwrap().to_json_pretty().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn service_depends_on_database() {
        let stack = build();
        let service = stack.resource("BackstageService").unwrap();
        assert!(service.depends_on.contains("BackstageAuroraDB"));
        assert!(service.depends_on.contains("BackstageAuroraDBInstance2"));
        assert!(service.depends_on.contains("CustomALBALBListener"));

        let graph = stack.validate().unwrap();
        assert!(graph.depends_transitively("BackstageService", "BackstageAuroraDB"));
        assert!(!graph.depends_transitively("BackstageAuroraDB", "BackstageService"));
    }

    #[test]
    fn database_accepts_only_the_service_group() {
        let stack = build();
        let rds = stack.resource("RdsSecurityGroup").unwrap();
        assert!(rds.property("security_group_ingress").is_none());

        let rules: Vec<_> = stack
            .resources()
            .iter()
            .filter(|r| r.resource_type() == SECURITY_GROUP_INGRESS)
            .filter(|r| {
                r.property("group_id") == Some(&Value::get_att("RdsSecurityGroup", "GroupId"))
            })
            .collect();
        assert_eq!(rules.len(), 1);
        let rule = rules[0];
        assert_eq!(
            rule.property("source_security_group_id"),
            Some(&Value::get_att("EcsSecurityGroup", "GroupId"))
        );
        assert!(rule.property("cidr_ip").is_none());
        assert_eq!(rule.property("from_port"), Some(&Value::Int(5432)));
    }

    #[test]
    fn load_balancer_group_opens_only_port_80() {
        let stack = build();
        let alb_sg = stack.resource("ALBSecurityGroup").unwrap();
        let rules = alb_sg
            .property("security_group_ingress")
            .and_then(Value::as_list)
            .unwrap();
        // "Allow HTTP" and the listener's open rule collapse into one
        assert_eq!(rules.len(), 1);
        for rule in rules {
            assert_eq!(rule.get("from_port"), Some(&Value::Int(80)));
            assert_eq!(rule.get("to_port"), Some(&Value::Int(80)));
            assert_eq!(rule.get("ip_protocol"), Some(&Value::string("tcp")));
        }
        assert!(
            !stack
                .resources()
                .iter()
                .filter(|r| r.resource_type() == SECURITY_GROUP_INGRESS)
                .any(|r| r.property("group_id")
                    == Some(&Value::get_att("ALBSecurityGroup", "GroupId")))
        );
    }

    #[test]
    fn container_port_matches_target_registration() {
        let stack = build();
        let task = stack.resource("BackstageTaskDef").unwrap();
        let container = &task
            .property("container_definitions")
            .and_then(Value::as_list)
            .unwrap()[0];
        let mapped = container
            .get("port_mappings")
            .and_then(Value::as_list)
            .unwrap()[0]
            .get("container_port")
            .cloned();

        let service = stack.resource("BackstageService").unwrap();
        let registration = &service
            .property("load_balancers")
            .and_then(Value::as_list)
            .unwrap()[0];
        assert_eq!(registration.get("container_port").cloned(), mapped);
        assert_eq!(mapped, Some(Value::Int(7007)));
        assert_eq!(
            registration.get("container_name"),
            Some(&Value::string(CONTAINER_NAME))
        );

        let listener = stack.resource("CustomALBALBListener").unwrap();
        assert_eq!(listener.property("port"), Some(&Value::Int(80)));
        // the load balancer reaches the tasks on the container port
        let ingress = "EcsSecurityGroupFromALBSecurityGroup7007";
        assert!(stack.resource(ingress).is_some());
    }

    #[test]
    fn removing_the_network_fails_before_apply() {
        let mut stack = build();
        stack.remove_resource("BackstageVpc").unwrap();

        let err = stack.validate().unwrap_err();
        assert!(matches!(
            err,
            StackError::UnresolvedReference { ref target, .. } if target == "BackstageVpc"
        ));

        assert!(Plan::deploy(&stack).is_err());
        assert!(matches!(
            Synthesizer::new(AwsProvider).synthesize(&stack),
            Err(SynthError::Stack(StackError::UnresolvedReference { .. }))
        ));
    }

    #[test]
    fn template_carries_the_container_environment() {
        let template = Synthesizer::new(AwsProvider).synthesize(&build()).unwrap();

        let task = template.resource("BackstageTaskDef").unwrap();
        assert_eq!(task.property("Cpu"), Some(&json!("512")));
        assert_eq!(task.property("Memory"), Some(&json!("1024")));
        assert_eq!(
            task.property("RuntimePlatform"),
            Some(&json!({ "CpuArchitecture": "ARM64", "OperatingSystemFamily": "LINUX" }))
        );

        let container = &task.property("ContainerDefinitions").unwrap()[0];
        assert_eq!(container["Name"], json!(CONTAINER_NAME));
        assert_eq!(
            container["Environment"][0],
            json!({
                "Name": "POSTGRES_HOST",
                "Value": { "Fn::GetAtt": ["BackstageAuroraDB", "Endpoint.Address"] }
            })
        );
        assert_eq!(
            container["Environment"][4]["Value"],
            json!({ "Fn::Join": ["", ["http://", { "Fn::GetAtt": ["CustomALB", "DNSName"] }]] })
        );
        assert_eq!(
            container["Secrets"][0],
            json!({
                "Name": "POSTGRES_PASSWORD",
                "ValueFrom": {
                    "Fn::Join": [
                        "",
                        [{ "Ref": "BackstageAuroraDBSecretAttachment" }, ":password::"]
                    ]
                }
            })
        );
        assert_eq!(
            container["LogConfiguration"]["Options"]["awslogs-stream-prefix"],
            json!("Backstage")
        );

        assert_eq!(
            template.outputs[OUTPUT_LOAD_BALANCER_DNS].value,
            json!({ "Fn::GetAtt": ["CustomALB", "DNSName"] })
        );
    }

    #[test]
    fn database_is_destroyed_with_the_stack() {
        let template = Synthesizer::new(AwsProvider).synthesize(&build()).unwrap();
        let cluster = template.resource("BackstageAuroraDB").unwrap();
        assert_eq!(cluster.deletion_policy.as_deref(), Some("Delete"));
        assert_eq!(cluster.property("Engine"), Some(&json!("aurora-postgresql")));
        assert_eq!(cluster.property("EngineVersion"), Some(&json!("13.12")));
        assert_eq!(
            cluster.property("ServerlessV2ScalingConfiguration"),
            Some(&json!({ "MaxCapacity": 4.0, "MinCapacity": 0.5 }))
        );
        assert_eq!(
            template.resources_of_type("AWS::RDS::DBInstance").count(),
            2
        );

        let bucket = template.resource("BackstageAssets").unwrap();
        assert_eq!(bucket.deletion_policy.as_deref(), Some("Retain"));
    }

    #[test]
    fn deploy_plan_orders_network_before_service() {
        let stack = build();
        let plan = Plan::deploy(&stack).unwrap();
        assert_eq!(plan.effects().len(), stack.resources().len());

        let vpc = plan.position("BackstageVpc").unwrap();
        let db = plan.position("BackstageAuroraDB").unwrap();
        let service = plan.position("BackstageService").unwrap();
        assert!(vpc < db);
        assert!(db < service);

        let teardown = Plan::destroy(&stack).unwrap();
        assert!(teardown.position("BackstageService") < teardown.position("BackstageAuroraDB"));
        assert_eq!(teardown.summary().retain, 2);
    }

    #[test]
    fn invalid_capacity_is_rejected() {
        let props = BackstageProps {
            min_capacity: 8.0,
            max_capacity: 4.0,
            ..Default::default()
        };
        let result = backstage_stack(DEFAULT_STACK_NAME, Environment::default(), &props);
        assert!(matches!(
            result,
            Err(ConstructError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn invalid_task_size_is_rejected() {
        let props = BackstageProps {
            memory_mib: 100,
            ..Default::default()
        };
        assert!(backstage_stack(DEFAULT_STACK_NAME, Environment::default(), &props).is_err());
    }

    #[test]
    fn stack_name_must_be_a_plain_name() {
        let result = backstage_stack(
            "../escaped",
            Environment::default(),
            &BackstageProps::default(),
        );
        assert!(matches!(
            result,
            Err(ConstructError::Stack(StackError::InvalidStackName(_)))
        ));

        let stack = backstage_stack(
            "backstage-dev",
            Environment::default(),
            &BackstageProps::default(),
        )
        .unwrap();
        let task_definition = stack.resource("BackstageTaskDef").unwrap();
        assert_eq!(
            task_definition.property("family"),
            Some(&Value::string("backstage-devBackstageTaskDef"))
        );
    }
}
