//! Load balancing constructs: application load balancer, listener, targets

use stackgraph_core::resource::{Resource, ResourceHandle, Value};
use stackgraph_core::stack::Stack;

use super::ec2::{Peer, Port, SecurityGroup, SubnetType, Vpc};
use super::{Construct, ConstructError, Result};
use crate::schemas::elbv2;

/// Application load balancer construct properties
#[derive(Debug, Clone)]
pub struct ApplicationLoadBalancerProps {
    pub internet_facing: bool,
    pub security_group: SecurityGroup,
}

/// An application load balancer
///
/// Internet-facing balancers sit in the public subnets and wait for the
/// public default routes; internal ones sit in the private subnets.
#[derive(Debug, Clone)]
pub struct ApplicationLoadBalancer {
    pub handle: ResourceHandle,
    security_group: SecurityGroup,
    vpc_id: Value,
}

impl ApplicationLoadBalancer {
    pub fn new(
        stack: &mut Stack,
        id: &str,
        vpc: &Vpc,
        props: ApplicationLoadBalancerProps,
    ) -> Result<Self> {
        let (scheme, subnets) = if props.internet_facing {
            ("internet-facing", SubnetType::Public)
        } else {
            ("internal", SubnetType::PrivateWithEgress)
        };

        let mut resource = Resource::new(elbv2::LOAD_BALANCER, id)
            .with_property(
                "load_balancer_attributes",
                Value::List(vec![Value::map([
                    ("key", Value::string("deletion_protection.enabled")),
                    ("value", Value::string("false")),
                ])]),
            )
            .with_property("scheme", scheme)
            .with_property(
                "security_groups",
                Value::List(vec![props.security_group.group_id()]),
            )
            .with_property("subnets", vpc.subnet_ids(subnets))
            .with_property("type", "application");
        resource
            .depends_on
            .extend(vpc.internet_connectivity(subnets).iter().cloned());

        let handle = stack.add_resource(resource)?;
        Ok(Self {
            handle,
            security_group: props.security_group,
            vpc_id: vpc.vpc_id(),
        })
    }

    pub fn arn(&self) -> Value {
        self.handle.reference()
    }

    pub fn dns_name(&self) -> Value {
        self.handle.attr("DNSName")
    }

    pub fn security_group(&self) -> &SecurityGroup {
        &self.security_group
    }

    /// Add an HTTP listener; `open` allows the port from anywhere
    pub fn add_listener(
        &self,
        stack: &mut Stack,
        id: &str,
        props: ListenerProps,
    ) -> Result<Listener> {
        let handle = stack.add_resource(
            Resource::new(
                elbv2::LISTENER,
                format!("{}{}", self.handle.logical_id(), id),
            )
            .with_property("load_balancer_arn", self.arn())
            .with_property("port", props.port)
            .with_property("protocol", "HTTP"),
        )?;

        if props.open {
            self.security_group.add_ingress_rule(
                stack,
                Peer::any_ipv4(),
                Port::tcp(props.port),
                &format!("Allow from anyone on port {}", props.port),
            )?;
        }

        Ok(Listener {
            handle,
            port: props.port,
            security_group: self.security_group.clone(),
            vpc_id: self.vpc_id.clone(),
        })
    }
}

/// Listener construct properties
#[derive(Debug, Clone, Copy)]
pub struct ListenerProps {
    pub port: u16,
    pub open: bool,
}

/// Target group health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub path: String,
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    pub healthy_threshold_count: u32,
    pub unhealthy_threshold_count: u32,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            interval_seconds: 30,
            timeout_seconds: 5,
            healthy_threshold_count: 2,
            unhealthy_threshold_count: 5,
        }
    }
}

impl HealthCheck {
    fn check(&self, construct: &str) -> Result<()> {
        if self.timeout_seconds >= self.interval_seconds {
            return Err(ConstructError::invalid(
                construct,
                format!(
                    "health check timeout ({}s) must be less than the interval ({}s)",
                    self.timeout_seconds, self.interval_seconds
                ),
            ));
        }
        if !self.path.starts_with('/') {
            return Err(ConstructError::invalid(
                construct,
                format!("health check path '{}' must start with '/'", self.path),
            ));
        }
        Ok(())
    }
}

/// Something a target group can forward to
///
/// Produced by the service that owns the container; see
/// `FargateService::load_balancer_target`.
#[derive(Debug, Clone)]
pub struct LoadBalancerTarget {
    pub service: String,
    pub container_name: String,
    pub container_port: u16,
    pub security_groups: Vec<SecurityGroup>,
}

/// Properties of `Listener::add_targets`
#[derive(Debug, Clone)]
pub struct AddTargetsProps {
    pub port: u16,
    pub targets: Vec<LoadBalancerTarget>,
    pub health_check: HealthCheck,
}

/// A load balancer listener
#[derive(Debug, Clone)]
pub struct Listener {
    pub handle: ResourceHandle,
    pub port: u16,
    security_group: SecurityGroup,
    vpc_id: Value,
}

impl Listener {
    pub fn logical_id(&self) -> &str {
        self.handle.logical_id()
    }

    /// Forward the listener's traffic to a new target group
    ///
    /// Each target is registered with the group, ordered after the listener,
    /// and its security groups are opened to the load balancer on the
    /// container port.
    pub fn add_targets(
        &self,
        stack: &mut Stack,
        id: &str,
        props: AddTargetsProps,
    ) -> Result<ResourceHandle> {
        let name = format!("{}{}Group", self.logical_id(), id);
        props.health_check.check(&name)?;

        if stack
            .resource(self.logical_id())
            .and_then(|l| l.property("default_actions"))
            .is_some()
        {
            return Err(ConstructError::invalid(
                self.logical_id(),
                "listener already forwards to a target group",
            ));
        }

        let check = &props.health_check;
        let group = stack.add_resource(
            Resource::new(elbv2::TARGET_GROUP, name)
                .with_property("port", props.port)
                .with_property("protocol", "HTTP")
                .with_property("target_type", "ip")
                .with_property("vpc_id", self.vpc_id.clone())
                .with_property("health_check_path", check.path.as_str())
                .with_property("health_check_interval_seconds", check.interval_seconds)
                .with_property("health_check_timeout_seconds", check.timeout_seconds)
                .with_property("healthy_threshold_count", check.healthy_threshold_count)
                .with_property("unhealthy_threshold_count", check.unhealthy_threshold_count),
        )?;

        stack.resource_mut(self.logical_id())?.set_property(
            "default_actions",
            Value::List(vec![Value::map([
                ("target_group_arn", group.reference()),
                ("type", Value::string("forward")),
            ])]),
        );

        for target in &props.targets {
            let service = stack.resource_mut(&target.service)?;
            service.append_property(
                "load_balancers",
                Value::map([
                    ("container_name", Value::string(target.container_name.as_str())),
                    ("container_port", Value::from(target.container_port)),
                    ("target_group_arn", group.reference()),
                ]),
            );
            let grace_period = "health_check_grace_period_seconds";
            if service.property(grace_period).is_none() {
                service.set_property(grace_period, 60u32);
            }
            stack.add_dependency(&target.service, self.logical_id())?;

            for security_group in &target.security_groups {
                security_group.add_ingress_rule(
                    stack,
                    Peer::security_group(&self.security_group),
                    Port::tcp(target.container_port),
                    "Load balancer to target",
                )?;
            }
            log::debug!(
                "{} -> {}:{} ({})",
                self.logical_id(),
                target.container_name,
                target.container_port,
                target.service
            );
        }

        Ok(group)
    }
}

impl Construct for Listener {
    fn id(&self) -> &str {
        self.logical_id()
    }

    fn node_ids(&self, _stack: &Stack) -> Vec<String> {
        vec![self.logical_id().to_string()]
    }
}
