//! Network constructs: VPC and security groups

use std::net::Ipv4Addr;

use stackgraph_core::resource::{Resource, ResourceHandle, Value};
use stackgraph_core::schema::parse_cidr;
use stackgraph_core::stack::Stack;

use super::{Construct, ConstructError, Result, name_tag};
use crate::schemas::ec2;

pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";
const ANY_IPV4: &str = "0.0.0.0/0";

/// VPC construct properties
#[derive(Debug, Clone)]
pub struct VpcProps {
    pub cidr: String,
    pub max_azs: usize,
}

impl Default for VpcProps {
    fn default() -> Self {
        Self {
            cidr: DEFAULT_VPC_CIDR.to_string(),
            max_azs: 3,
        }
    }
}

/// Subnet tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetType {
    Public,
    PrivateWithEgress,
}

/// A VPC with one public and one private subnet per availability zone
///
/// Public subnets route to an internet gateway; each private subnet routes
/// through the NAT gateway in its zone's public subnet.
#[derive(Debug, Clone)]
pub struct Vpc {
    id: String,
    pub vpc: ResourceHandle,
    pub public_subnets: Vec<ResourceHandle>,
    pub private_subnets: Vec<ResourceHandle>,
    public_default_routes: Vec<String>,
    private_default_routes: Vec<String>,
    children: Vec<String>,
}

impl Vpc {
    pub fn new(stack: &mut Stack, id: &str, props: VpcProps) -> Result<Self> {
        if props.max_azs == 0 {
            return Err(ConstructError::invalid(id, "max_azs must be at least 1"));
        }
        let cidrs = subnet_cidrs(&props.cidr, props.max_azs.saturating_mul(2))
            .map_err(|e| ConstructError::invalid(id, e))?;

        let mut children = Vec::new();

        let tags = name_tag(stack, id);
        let vpc = declare(
            stack,
            &mut children,
            Resource::new(ec2::VPC, id)
                .with_property("cidr_block", props.cidr.as_str())
                .with_property("enable_dns_hostnames", true)
                .with_property("enable_dns_support", true)
                .with_property("instance_tenancy", "default")
                .with_property("tags", tags.clone()),
        )?;
        let igw = declare(
            stack,
            &mut children,
            Resource::new(ec2::INTERNET_GATEWAY, format!("{}IGW", id)).with_property("tags", tags),
        )?;
        let attachment = declare(
            stack,
            &mut children,
            Resource::new(ec2::VPC_GATEWAY_ATTACHMENT, format!("{}VPCGW", id))
                .with_property("vpc_id", vpc.reference())
                .with_property("internet_gateway_id", igw.reference()),
        )?;

        let mut public_subnets = Vec::new();
        let mut private_subnets = Vec::new();
        let mut public_default_routes = Vec::new();
        let mut private_default_routes = Vec::new();
        let mut nat_gateways = Vec::new();

        for (az, cidr) in cidrs.iter().take(props.max_azs).enumerate() {
            let name = format!("{}PublicSubnet{}", id, az + 1);
            let tags = name_tag(stack, &format!("{}/PublicSubnet{}", id, az + 1));
            let subnet = declare(
                stack,
                &mut children,
                subnet(&name, &vpc, cidr, az)
                    .with_property("map_public_ip_on_launch", true)
                    .with_property("tags", tags.clone()),
            )?;
            let route_table = declare(stack, &mut children, route_table(&name, &vpc, &tags))?;
            declare(
                stack,
                &mut children,
                association(&name, &route_table, &subnet),
            )?;

            let mut route = Resource::new(ec2::ROUTE, format!("{}DefaultRoute", name))
                .with_property("route_table_id", route_table.reference())
                .with_property("destination_cidr_block", ANY_IPV4)
                .with_property("gateway_id", igw.reference());
            // the route is only usable once the gateway is attached
            route.depends_on.insert(attachment.logical_id().to_string());
            let route = declare(stack, &mut children, route)?;
            public_default_routes.push(route.logical_id().to_string());

            let eip = declare(
                stack,
                &mut children,
                Resource::new(ec2::EIP, format!("{}EIP", name))
                    .with_property("domain", "vpc")
                    .with_property("tags", tags.clone()),
            )?;
            let mut nat = Resource::new(ec2::NAT_GATEWAY, format!("{}NATGateway", name))
                .with_property("subnet_id", subnet.reference())
                .with_property("allocation_id", eip.attr("AllocationId"))
                .with_property("tags", tags);
            nat.depends_on.insert(route.logical_id().to_string());
            nat_gateways.push(declare(stack, &mut children, nat)?);

            public_subnets.push(subnet);
        }

        for (az, cidr) in cidrs.iter().skip(props.max_azs).enumerate() {
            let name = format!("{}PrivateSubnet{}", id, az + 1);
            let tags = name_tag(stack, &format!("{}/PrivateSubnet{}", id, az + 1));
            let subnet = declare(
                stack,
                &mut children,
                subnet(&name, &vpc, cidr, az)
                    .with_property("map_public_ip_on_launch", false)
                    .with_property("tags", tags.clone()),
            )?;
            let route_table = declare(stack, &mut children, route_table(&name, &vpc, &tags))?;
            declare(
                stack,
                &mut children,
                association(&name, &route_table, &subnet),
            )?;

            let route = declare(
                stack,
                &mut children,
                Resource::new(ec2::ROUTE, format!("{}DefaultRoute", name))
                    .with_property("route_table_id", route_table.reference())
                    .with_property("destination_cidr_block", ANY_IPV4)
                    .with_property("nat_gateway_id", nat_gateways[az].reference()),
            )?;
            private_default_routes.push(route.logical_id().to_string());

            private_subnets.push(subnet);
        }

        log::debug!(
            "vpc {} with {} availability zones ({})",
            id,
            props.max_azs,
            props.cidr
        );
        Ok(Self {
            id: id.to_string(),
            vpc,
            public_subnets,
            private_subnets,
            public_default_routes,
            private_default_routes,
            children,
        })
    }

    pub fn vpc_id(&self) -> Value {
        self.vpc.reference()
    }

    pub fn subnet_ids(&self, subnet_type: SubnetType) -> Value {
        let subnets = match subnet_type {
            SubnetType::Public => &self.public_subnets,
            SubnetType::PrivateWithEgress => &self.private_subnets,
        };
        Value::List(subnets.iter().map(ResourceHandle::reference).collect())
    }

    /// Routes that must exist before resources in `subnet_type` can reach out
    pub fn internet_connectivity(&self, subnet_type: SubnetType) -> &[String] {
        match subnet_type {
            SubnetType::Public => &self.public_default_routes,
            SubnetType::PrivateWithEgress => &self.private_default_routes,
        }
    }
}

impl Construct for Vpc {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_ids(&self, _stack: &Stack) -> Vec<String> {
        self.children.clone()
    }
}

fn declare(
    stack: &mut Stack,
    children: &mut Vec<String>,
    resource: Resource,
) -> Result<ResourceHandle> {
    let handle = stack.add_resource(resource)?;
    children.push(handle.logical_id().to_string());
    Ok(handle)
}

fn subnet(name: &str, vpc: &ResourceHandle, cidr: &str, az: usize) -> Resource {
    Resource::new(ec2::SUBNET, name)
        .with_property("vpc_id", vpc.reference())
        .with_property("cidr_block", cidr)
        .with_property("availability_zone", Value::select(az, Value::GetAzs))
}

fn route_table(subnet: &str, vpc: &ResourceHandle, tags: &Value) -> Resource {
    Resource::new(ec2::ROUTE_TABLE, format!("{}RouteTable", subnet))
        .with_property("vpc_id", vpc.reference())
        .with_property("tags", tags.clone())
}

fn association(
    subnet_name: &str,
    route_table: &ResourceHandle,
    subnet: &ResourceHandle,
) -> Resource {
    Resource::new(
        ec2::SUBNET_ROUTE_TABLE_ASSOCIATION,
        format!("{}RouteTableAssociation", subnet_name),
    )
    .with_property("route_table_id", route_table.reference())
    .with_property("subnet_id", subnet.reference())
}

/// Split a CIDR block into `count` equal subnets
///
/// The prefix grows by the number of bits needed to hold `count` subnets,
/// so two zones (four subnets) of a /16 get /18s.
pub fn subnet_cidrs(cidr: &str, count: usize) -> std::result::Result<Vec<String>, String> {
    let (addr, prefix) = parse_cidr(cidr)?;
    let Some(slots) = count.checked_next_power_of_two() else {
        return Err(format!("Cannot split {} into {} subnets", cidr, count));
    };
    let bits = slots.trailing_zeros() as u8;
    let subnet_prefix = prefix + bits;
    if subnet_prefix > 28 {
        return Err(format!(
            "{} is too small for {} subnets (would need /{})",
            cidr, count, subnet_prefix
        ));
    }

    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    let base = u32::from(addr) & mask;
    let size = 1u32 << (32 - subnet_prefix);
    Ok((0..count as u32)
        .map(|i| format!("{}/{}", Ipv4Addr::from(base + i * size), subnet_prefix))
        .collect())
}

/// Traffic source of an ingress rule
#[derive(Debug, Clone)]
pub enum Peer {
    AnyIpv4,
    SecurityGroup(ResourceHandle),
}

impl Peer {
    pub fn any_ipv4() -> Self {
        Peer::AnyIpv4
    }

    pub fn security_group(group: &SecurityGroup) -> Self {
        Peer::SecurityGroup(group.handle.clone())
    }
}

/// Protocol and port range of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub protocol: &'static str,
    pub from_port: u16,
    pub to_port: u16,
}

impl Port {
    pub fn tcp(port: u16) -> Self {
        Self {
            protocol: "tcp",
            from_port: port,
            to_port: port,
        }
    }

    fn label(&self) -> String {
        if self.from_port == self.to_port {
            self.from_port.to_string()
        } else {
            format!("{}to{}", self.from_port, self.to_port)
        }
    }
}

/// Security group construct properties
#[derive(Debug, Clone)]
pub struct SecurityGroupProps {
    pub description: Option<String>,
    pub allow_all_outbound: bool,
}

impl Default for SecurityGroupProps {
    fn default() -> Self {
        Self {
            description: None,
            allow_all_outbound: true,
        }
    }
}

/// A security group
///
/// Rules from CIDR peers are written inline; rules from other groups become
/// standalone ingress resources so two groups can refer to each other
/// without a cycle. Adding a rule that already exists is a no-op.
#[derive(Debug, Clone)]
pub struct SecurityGroup {
    pub handle: ResourceHandle,
}

impl SecurityGroup {
    pub fn new(stack: &mut Stack, id: &str, vpc: &Vpc, props: SecurityGroupProps) -> Result<Self> {
        let egress = if props.allow_all_outbound {
            Value::map([
                ("cidr_ip", Value::string(ANY_IPV4)),
                ("description", Value::string("Allow all outbound traffic by default")),
                ("ip_protocol", Value::string("-1")),
            ])
        } else {
            // a rule that matches nothing replaces the implicit allow-all
            Value::map([
                ("cidr_ip", Value::string("255.255.255.255/32")),
                ("description", Value::string("Disallow all traffic")),
                ("from_port", Value::Int(252)),
                ("ip_protocol", Value::string("icmp")),
                ("to_port", Value::Int(86)),
            ])
        };

        let description = props.description.unwrap_or_else(|| stack.path(id));
        let handle = stack.add_resource(
            Resource::new(ec2::SECURITY_GROUP, id)
                .with_property("group_description", description)
                .with_property("vpc_id", vpc.vpc_id())
                .with_property("security_group_egress", Value::List(vec![egress])),
        )?;
        Ok(Self { handle })
    }

    pub fn logical_id(&self) -> &str {
        self.handle.logical_id()
    }

    pub fn group_id(&self) -> Value {
        self.handle.attr("GroupId")
    }

    /// `GroupId` list for the `security_groups` field of other resources
    pub fn group_ids(groups: &[SecurityGroup]) -> Value {
        Value::List(groups.iter().map(SecurityGroup::group_id).collect())
    }

    /// Allow inbound traffic from `peer` on `port`
    pub fn add_ingress_rule(
        &self,
        stack: &mut Stack,
        peer: Peer,
        port: Port,
        description: &str,
    ) -> Result<()> {
        match peer {
            Peer::AnyIpv4 => {
                let group = stack.resource_mut(self.logical_id())?;
                let exists = group
                    .property("security_group_ingress")
                    .and_then(Value::as_list)
                    .is_some_and(|rules| {
                        rules.iter().any(|rule| {
                            rule.get("cidr_ip").and_then(Value::as_str) == Some(ANY_IPV4)
                                && rule.get("ip_protocol").and_then(Value::as_str)
                                    == Some(port.protocol)
                                && rule.get("from_port").and_then(Value::as_int)
                                    == Some(port.from_port as i64)
                                && rule.get("to_port").and_then(Value::as_int)
                                    == Some(port.to_port as i64)
                        })
                    });
                if exists {
                    log::debug!(
                        "{}: rule for {} on {} exists",
                        self.logical_id(),
                        ANY_IPV4,
                        port.label()
                    );
                    return Ok(());
                }
                group.append_property(
                    "security_group_ingress",
                    Value::map([
                        ("cidr_ip", Value::string(ANY_IPV4)),
                        ("description", Value::string(description)),
                        ("from_port", Value::from(port.from_port)),
                        ("ip_protocol", Value::string(port.protocol)),
                        ("to_port", Value::from(port.to_port)),
                    ]),
                );
            }
            Peer::SecurityGroup(source) => {
                let name = format!(
                    "{}From{}{}",
                    self.logical_id(),
                    source.logical_id(),
                    port.label()
                );
                if stack.resource(&name).is_some() {
                    log::debug!("{}: rule {} exists", self.logical_id(), name);
                    return Ok(());
                }
                stack.add_resource(
                    Resource::new(ec2::SECURITY_GROUP_INGRESS, name)
                        .with_property("ip_protocol", port.protocol)
                        .with_property("group_id", self.group_id())
                        .with_property("source_security_group_id", source.attr("GroupId"))
                        .with_property("description", description)
                        .with_property("from_port", port.from_port)
                        .with_property("to_port", port.to_port),
                )?;
            }
        }
        Ok(())
    }
}

impl Construct for SecurityGroup {
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
    use stackgraph_core::stack::Environment;

    fn stack() -> Stack {
        Stack::new("Test", Environment::default()).unwrap()
    }

    #[test]
    fn subnet_cidrs_for_two_zones() {
        assert_eq!(
            subnet_cidrs("10.0.0.0/16", 4).unwrap(),
            vec![
                "10.0.0.0/18",
                "10.0.64.0/18",
                "10.0.128.0/18",
                "10.0.192.0/18",
            ]
        );
        assert_eq!(subnet_cidrs("10.0.0.0/16", 6).unwrap()[5], "10.0.160.0/19");
        assert!(subnet_cidrs("10.0.0.0/27", 4).is_err());
        assert!(subnet_cidrs("10.0.0/16", 4).is_err());
        assert!(subnet_cidrs("10.0.0.0/16", usize::MAX).is_err());
    }

    #[test]
    fn vpc_declares_subnets_per_zone() {
        let mut stack = stack();
        let vpc = Vpc::new(
            &mut stack,
            "Network",
            VpcProps {
                max_azs: 2,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(vpc.public_subnets.len(), 2);
        assert_eq!(vpc.private_subnets.len(), 2);
        let private = stack.resource("NetworkPrivateSubnet2").unwrap();
        assert_eq!(
            private.property("cidr_block"),
            Some(&Value::string("10.0.192.0/18"))
        );
        assert_eq!(
            private.property("availability_zone"),
            Some(&Value::select(1, Value::GetAzs))
        );

        // private subnets route through their zone's NAT gateway
        let route = stack.resource("NetworkPrivateSubnet2DefaultRoute").unwrap();
        assert_eq!(
            route.property("nat_gateway_id"),
            Some(&Value::reference("NetworkPublicSubnet2NATGateway"))
        );
        let public_route = stack.resource("NetworkPublicSubnet1DefaultRoute").unwrap();
        assert!(public_route.depends_on.contains("NetworkVPCGW"));
        assert!(stack.validate().is_ok());
    }

    #[test]
    fn vpc_rejects_zero_zones() {
        let result = Vpc::new(
            &mut stack(),
            "Network",
            VpcProps {
                max_azs: 0,
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(ConstructError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn ingress_rules() {
        let mut stack = stack();
        let vpc = Vpc::new(&mut stack, "Network", VpcProps::default()).unwrap();
        let web =
            SecurityGroup::new(&mut stack, "Web", &vpc, SecurityGroupProps::default()).unwrap();
        let db = SecurityGroup::new(&mut stack, "Db", &vpc, SecurityGroupProps::default()).unwrap();

        web.add_ingress_rule(&mut stack, Peer::any_ipv4(), Port::tcp(80), "Allow HTTP")
            .unwrap();
        web.add_ingress_rule(&mut stack, Peer::any_ipv4(), Port::tcp(80), "Again")
            .unwrap();
        let from_web = Peer::security_group(&web);
        db.add_ingress_rule(&mut stack, from_web.clone(), Port::tcp(5432), "Allow web")
            .unwrap();
        db.add_ingress_rule(&mut stack, from_web, Port::tcp(5432), "Allow web")
            .unwrap();

        let rules = stack
            .resource("Web")
            .unwrap()
            .property("security_group_ingress")
            .and_then(Value::as_list)
            .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].get("description"), Some(&Value::string("Allow HTTP")));

        let rule = stack.resource("DbFromWeb5432").unwrap();
        assert_eq!(
            rule.property("source_security_group_id"),
            Some(&Value::get_att("Web", "GroupId"))
        );
        assert!(rule.property("cidr_ip").is_none());
        assert!(stack.validate().is_ok());
    }

    #[test]
    fn restricted_outbound() {
        let mut stack = stack();
        let vpc = Vpc::new(&mut stack, "Network", VpcProps::default()).unwrap();
        SecurityGroup::new(
            &mut stack,
            "Closed",
            &vpc,
            SecurityGroupProps {
                description: Some("closed".to_string()),
                allow_all_outbound: false,
            },
        )
        .unwrap();

        let group = stack.resource("Closed").unwrap();
        let egress = group.property("security_group_egress").unwrap();
        assert_eq!(
            egress.as_list().unwrap()[0].get("ip_protocol"),
            Some(&Value::string("icmp"))
        );
        assert_eq!(group.property("group_description"), Some(&Value::string("closed")));
    }
}
