//! RDS constructs: Aurora database cluster with generated credentials

use stackgraph_core::resource::{RemovalPolicy, Resource, ResourceHandle, Value};
use stackgraph_core::stack::Stack;

use super::ec2::{SecurityGroup, SubnetType, Vpc};
use super::{Construct, ConstructError, Result};
use crate::schemas::{rds, secretsmanager};
use crate::types::validate_capacity;

/// Characters left out of generated database passwords
const EXCLUDED_PASSWORD_CHARACTERS: &str = " %+~`#$&*()|[]{}:;<>?!'/@\"\\";

/// Aurora engine and version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEngine {
    pub engine: &'static str,
    pub version: String,
    pub default_port: u16,
}

impl ClusterEngine {
    pub fn aurora_postgres(version: impl Into<String>) -> Self {
        Self {
            engine: "aurora-postgresql",
            version: version.into(),
            default_port: 5432,
        }
    }
}

/// Master user credentials, stored in a generated secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
}

impl Credentials {
    pub fn from_generated_secret(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Database cluster construct properties
#[derive(Debug, Clone)]
pub struct DatabaseClusterProps {
    pub engine: ClusterEngine,
    pub credentials: Credentials,
    pub default_database_name: Option<String>,
    pub instance_class: String,
    pub instances: usize,
    pub security_groups: Vec<SecurityGroup>,
    pub serverless_v2_min_capacity: f64,
    pub serverless_v2_max_capacity: f64,
    pub removal_policy: RemovalPolicy,
}

/// An Aurora database cluster
///
/// Declares a subnet group over the private subnets, a generated secret
/// with the master credentials, the cluster, the secret's attachment to the
/// cluster, and `instances` instances (each created after the previous).
#[derive(Debug, Clone)]
pub struct DatabaseCluster {
    id: String,
    pub handle: ResourceHandle,
    pub port: u16,
    secret: ResourceHandle,
    children: Vec<String>,
}

impl DatabaseCluster {
    pub fn new(
        stack: &mut Stack,
        id: &str,
        vpc: &Vpc,
        props: DatabaseClusterProps,
    ) -> Result<Self> {
        check_capacity(
            id,
            props.serverless_v2_min_capacity,
            props.serverless_v2_max_capacity,
        )?;
        if props.instances == 0 {
            return Err(ConstructError::invalid(id, "at least one instance is required"));
        }

        let mut children = Vec::new();
        let mut declare = |stack: &mut Stack, resource: Resource| -> Result<ResourceHandle> {
            let handle = stack.add_resource(resource)?;
            children.push(handle.logical_id().to_string());
            Ok(handle)
        };

        let subnets = declare(
            stack,
            Resource::new(rds::DB_SUBNET_GROUP, format!("{}Subnets", id))
                .with_property(
                    "db_subnet_group_description",
                    format!("Subnets for {} database", id),
                )
                .with_property("subnet_ids", vpc.subnet_ids(SubnetType::PrivateWithEgress)),
        )?;

        let template = format!("{{\"username\":\"{}\"}}", props.credentials.username);
        let secret = declare(
            stack,
            Resource::new(secretsmanager::SECRET, format!("{}Secret", id))
                .with_property("description", format!("Master credentials for {}", id))
                .with_property(
                    "generate_secret_string",
                    Value::map([
                        ("exclude_characters", Value::string(EXCLUDED_PASSWORD_CHARACTERS)),
                        ("generate_string_key", Value::string("password")),
                        ("password_length", Value::Int(30)),
                        ("secret_string_template", Value::string(template)),
                    ]),
                )
                .with_removal_policy(props.removal_policy),
        )?;

        let resolve = |field: &str| {
            Value::join(
                "",
                vec![
                    Value::string("{{resolve:secretsmanager:"),
                    secret.reference(),
                    Value::string(format!(":SecretString:{}::}}}}", field)),
                ],
            )
        };

        let mut cluster = Resource::new(rds::DB_CLUSTER, id)
            .with_property("engine", props.engine.engine)
            .with_property("engine_version", props.engine.version.as_str())
            .with_property("db_subnet_group_name", subnets.reference())
            .with_property("master_username", resolve("username"))
            .with_property("master_user_password", resolve("password"))
            .with_property(
                "vpc_security_group_ids",
                SecurityGroup::group_ids(&props.security_groups),
            )
            .with_property(
                "serverless_v2_scaling_configuration",
                Value::map([
                    ("min_capacity", Value::Float(props.serverless_v2_min_capacity)),
                    ("max_capacity", Value::Float(props.serverless_v2_max_capacity)),
                ]),
            )
            .with_property("copy_tags_to_snapshot", true)
            .with_property("storage_encrypted", true)
            .with_removal_policy(props.removal_policy);
        if let Some(name) = &props.default_database_name {
            cluster.set_property("database_name", name.as_str());
        }
        let cluster = declare(stack, cluster)?;

        let attachment = declare(
            stack,
            Resource::new(
                secretsmanager::SECRET_TARGET_ATTACHMENT,
                format!("{}SecretAttachment", id),
            )
            .with_property("secret_id", secret.reference())
            .with_property("target_id", cluster.reference())
            .with_property("target_type", rds::DB_CLUSTER),
        )?;

        let mut previous: Option<String> = None;
        for n in 1..=props.instances {
            let mut instance = Resource::new(rds::DB_INSTANCE, format!("{}Instance{}", id, n))
                .with_property("db_cluster_identifier", cluster.reference())
                .with_property("db_instance_class", props.instance_class.as_str())
                .with_property("db_subnet_group_name", subnets.reference())
                .with_property("engine", props.engine.engine)
                .with_property("publicly_accessible", false)
                .with_removal_policy(props.removal_policy);
            instance.depends_on.extend(
                vpc.internet_connectivity(SubnetType::PrivateWithEgress)
                    .iter()
                    .cloned(),
            );
            // instances are created one at a time
            if let Some(previous) = previous.take() {
                instance.depends_on.insert(previous);
            }
            previous = Some(declare(stack, instance)?.logical_id().to_string());
        }

        log::debug!(
            "database cluster {} ({} {}, {} instances)",
            id,
            props.engine.engine,
            props.engine.version,
            props.instances
        );
        Ok(Self {
            id: id.to_string(),
            handle: cluster,
            port: props.engine.default_port,
            secret: attachment,
            children,
        })
    }

    /// Hostname of the writer endpoint
    pub fn endpoint_address(&self) -> Value {
        self.handle.attr("Endpoint.Address")
    }

    pub fn endpoint_port(&self) -> Value {
        self.handle.attr("Endpoint.Port")
    }

    /// The credentials secret, as attached to the cluster
    pub fn secret(&self) -> &ResourceHandle {
        &self.secret
    }
}

impl Construct for DatabaseCluster {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_ids(&self, _stack: &Stack) -> Vec<String> {
        self.children.clone()
    }
}

fn check_capacity(id: &str, min: f64, max: f64) -> Result<()> {
    validate_capacity(min).map_err(|e| ConstructError::invalid(id, e))?;
    validate_capacity(max).map_err(|e| ConstructError::invalid(id, e))?;
    if min > max {
        return Err(ConstructError::invalid(
            id,
            format!("minimum capacity {} exceeds maximum {}", min, max),
        ));
    }
    Ok(())
}
