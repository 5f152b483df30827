//! Resource - Declared resources and the values their properties hold

use std::collections::{BTreeMap, BTreeSet};

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// Provider resource type (e.g., "AWS::EC2::VPC")
    pub resource_type: String,
    /// Logical id, unique within a stack
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.resource_type)
    }
}

/// Property value of a resource
///
/// Besides literals, a value can be an intrinsic that the provisioning engine
/// resolves at deploy time. `Ref` and `GetAtt` are what make the declaration
/// set a graph: each one is an edge to the resource it names.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Primary identifier of another resource
    Ref(String),
    /// Attribute of another resource (logical_id, attribute_name)
    GetAtt(String, String),
    /// Concatenation of parts with a separator
    Join { separator: String, parts: Vec<Value> },
    /// Element of a list value
    Select { index: usize, list: Box<Value> },
    /// Availability zones of the region the stack is deployed to
    GetAzs,
    /// Engine pseudo parameter (e.g., "AWS::Region")
    Pseudo(String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Value::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::GetAtt(logical_id.into(), attribute.into())
    }

    pub fn join(separator: impl Into<String>, parts: Vec<Value>) -> Self {
        Value::Join {
            separator: separator.into(),
            parts,
        }
    }

    pub fn select(index: usize, list: Value) -> Self {
        Value::Select {
            index,
            list: Box::new(list),
        }
    }

    pub fn pseudo(name: impl Into<String>) -> Self {
        Value::Pseudo(name.into())
    }

    /// Build a map value from `(key, value)` pairs
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns true if the value is only known once the engine deploys the stack
    pub fn is_intrinsic(&self) -> bool {
        matches!(
            self,
            Value::Ref(_)
                | Value::GetAtt(..)
                | Value::Join { .. }
                | Value::Select { .. }
                | Value::GetAzs
                | Value::Pseudo(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key when this value is a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Collect the logical ids this value refers to
    pub fn collect_references(&self, refs: &mut BTreeSet<String>) {
        match self {
            Value::Ref(logical_id) | Value::GetAtt(logical_id, _) => {
                refs.insert(logical_id.clone());
            }
            Value::List(items) | Value::Join { parts: items, .. } => {
                for item in items {
                    item.collect_references(refs);
                }
            }
            Value::Map(map) => {
                for v in map.values() {
                    v.collect_references(refs);
                }
            }
            Value::Select { list, .. } => list.collect_references(refs),
            Value::String(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Bool(_)
            | Value::GetAzs
            | Value::Pseudo(_) => {}
        }
    }

    /// Logical ids this value refers to
    pub fn references(&self) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        self.collect_references(&mut refs);
        refs
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// What happens to the live resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Delete the live resource
    Destroy,
    /// Keep the live resource, orphaned from the stack
    Retain,
    /// Take a final snapshot, then delete
    Snapshot,
}

impl RemovalPolicy {
    /// Name of the policy as the engine spells it
    pub fn as_engine_str(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

/// Declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub properties: BTreeMap<String, Value>,
    /// Explicit ordering edges (logical ids), on top of property references
    pub depends_on: BTreeSet<String>,
    pub removal_policy: Option<RemovalPolicy>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            properties: BTreeMap::new(),
            depends_on: BTreeSet::new(),
            removal_policy: None,
        }
    }

    pub fn logical_id(&self) -> &str {
        &self.id.name
    }

    pub fn resource_type(&self) -> &str {
        &self.id.resource_type
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Append to a list property, creating it if absent
    ///
    /// A present non-list value is replaced by a one-element list.
    pub fn append_property(&mut self, key: impl Into<String>, value: Value) {
        let entry = self
            .properties
            .entry(key.into())
            .or_insert_with(|| Value::List(Vec::new()));
        match entry {
            Value::List(items) => items.push(value),
            other => *other = Value::List(vec![value]),
        }
    }

    /// Logical ids referenced from properties
    pub fn references(&self) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        for value in self.properties.values() {
            value.collect_references(&mut refs);
        }
        refs
    }

    /// All logical ids this resource must be created after
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = self.references();
        deps.extend(self.depends_on.iter().cloned());
        deps
    }

    /// Returns true if the live resource survives removal from the stack
    pub fn is_retained(&self) -> bool {
        matches!(self.removal_policy, Some(RemovalPolicy::Retain))
    }
}

/// Handle to a resource added to a stack
///
/// Handles produce the intrinsic values other resources use to refer to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    pub id: ResourceId,
}

impl ResourceHandle {
    pub fn new(id: ResourceId) -> Self {
        Self { id }
    }

    pub fn logical_id(&self) -> &str {
        &self.id.name
    }

    /// `Ref` to this resource
    pub fn reference(&self) -> Value {
        Value::Ref(self.id.name.clone())
    }

    /// `GetAtt` on this resource
    pub fn attr(&self, attribute: impl Into<String>) -> Value {
        Value::GetAtt(self.id.name.clone(), attribute.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_collected_recursively() {
        let value = Value::map([
            ("vpc", Value::reference("Vpc")),
            (
                "subnets",
                Value::List(vec![Value::reference("SubnetA"), Value::reference("SubnetB")]),
            ),
            ("url", Value::join("", vec![Value::get_att("Alb", "DNSName")])),
            ("az", Value::select(0, Value::GetAzs)),
            ("region", Value::pseudo("AWS::Region")),
        ]);

        let refs: Vec<_> = value.references().into_iter().collect();
        assert_eq!(refs, vec!["Alb", "SubnetA", "SubnetB", "Vpc"]);
    }

    #[test]
    fn dependencies_include_explicit_edges() {
        let mut resource = Resource::new("AWS::ECS::Service", "Service")
            .with_property("cluster", Value::reference("Cluster"));
        resource.depends_on.insert("Database".to_string());

        let deps = resource.dependencies();
        assert!(deps.contains("Cluster"));
        assert!(deps.contains("Database"));
        assert_eq!(resource.references().len(), 1);
    }

    #[test]
    fn append_property_creates_list() {
        let mut resource = Resource::new("AWS::EC2::SecurityGroup", "Sg");
        resource.append_property("security_group_ingress", Value::Int(1));
        resource.append_property("security_group_ingress", Value::Int(2));

        assert_eq!(
            resource.property("security_group_ingress"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn literals_are_not_intrinsic() {
        assert!(!Value::string("x").is_intrinsic());
        assert!(!Value::Int(1).is_intrinsic());
        assert!(Value::reference("X").is_intrinsic());
        assert!(Value::GetAzs.is_intrinsic());
    }

    #[test]
    fn handle_builds_intrinsics() {
        let handle = ResourceHandle::new(ResourceId::new("AWS::S3::Bucket", "Assets"));
        assert_eq!(handle.reference(), Value::Ref("Assets".to_string()));
        assert_eq!(
            handle.attr("Arn"),
            Value::GetAtt("Assets".to_string(), "Arn".to_string())
        );
    }

    #[test]
    fn retain_policy_is_reported() {
        let bucket =
            Resource::new("AWS::S3::Bucket", "B").with_removal_policy(RemovalPolicy::Retain);
        let db =
            Resource::new("AWS::RDS::DBCluster", "D").with_removal_policy(RemovalPolicy::Destroy);
        assert!(bucket.is_retained());
        assert!(!db.is_retained());
        assert_eq!(db.removal_policy.map(|p| p.as_engine_str()), Some("Delete"));
    }
}
