//! Synthesizer - Turn a Stack into a Template using a Provider
//!
//! The Synthesizer validates the stack's graph and every resource's properties
//! against the provider's schemas, then renders the template. Nothing is
//! deployed here: the template is the only product.

use std::collections::HashMap;

use serde_json::{Value as Json, json};

use crate::provider::Provider;
use crate::resource::{Resource, ResourceId, Value};
use crate::schema::{AttributeType, ResourceSchema, TypeError};
use crate::stack::{Stack, StackError};
use crate::template::{Template, TemplateOutput, TemplateResource};

/// Synthesis error
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error(transparent)]
    Stack(#[from] StackError),

    #[error("Unknown resource type '{resource_type}' for {logical_id}")]
    UnknownResourceType {
        logical_id: String,
        resource_type: String,
    },

    #[error("Invalid properties:\n{}", format_schema_errors(.0))]
    Schema(Vec<(ResourceId, TypeError)>),
}

fn format_schema_errors(errors: &[(ResourceId, TypeError)]) -> String {
    errors
        .iter()
        .map(|(id, e)| format!("  {}: {}", id.name, e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Synthesizer configuration
#[derive(Debug, Clone, Default)]
pub struct SynthConfig {
    /// Render resources whose type the provider does not know, unvalidated
    pub allow_unknown_types: bool,
}

/// Synthesizer that renders Stacks using a Provider
pub struct Synthesizer<P: Provider> {
    provider: P,
    schemas: HashMap<String, ResourceSchema>,
    config: SynthConfig,
}

impl<P: Provider> Synthesizer<P> {
    pub fn new(provider: P) -> Self {
        let schemas = provider.schemas();
        Self {
            provider,
            schemas,
            config: SynthConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SynthConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Validate the stack and its resources without rendering
    pub fn check(&self, stack: &Stack) -> Result<(), SynthError> {
        stack.validate()?;

        let mut errors = Vec::new();
        for resource in stack.resources() {
            match self.schemas.get(resource.resource_type()) {
                Some(schema) => {
                    if let Err(errs) = schema.validate(&resource.properties) {
                        errors.extend(errs.into_iter().map(|e| (resource.id.clone(), e)));
                    }
                }
                None if self.config.allow_unknown_types => {
                    log::warn!("{} has no schema, skipping validation", resource.id);
                }
                None => {
                    return Err(SynthError::UnknownResourceType {
                        logical_id: resource.logical_id().to_string(),
                        resource_type: resource.resource_type().to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SynthError::Schema(errors))
        }
    }

    /// Validate and render a stack
    pub fn synthesize(&self, stack: &Stack) -> Result<Template, SynthError> {
        self.check(stack)?;

        let mut template = Template::new(stack.description().map(str::to_string));
        for resource in stack.resources() {
            log::debug!("synthesize {}", resource.id);
            template.resources.insert(
                resource.logical_id().to_string(),
                self.render_resource(resource),
            );
        }
        for output in stack.outputs() {
            template.outputs.insert(
                output.name.clone(),
                TemplateOutput {
                    description: output.description.clone(),
                    value: render_intrinsics(&output.value, None, &|k| k.to_string()),
                },
            );
        }

        log::info!(
            "synthesized stack {} ({} resources, {} outputs)",
            stack.name(),
            template.resources.len(),
            template.outputs.len()
        );
        Ok(template)
    }

    fn render_resource(&self, resource: &Resource) -> TemplateResource {
        let schema = self.schemas.get(resource.resource_type());
        let naming = |attr: &str| self.provider.property_name(attr);

        let mut properties = serde_json::Map::new();
        for (key, value) in &resource.properties {
            let attr = schema.and_then(|s| s.attributes.get(key));
            let name = attr
                .and_then(|a| a.provider_name.clone())
                .unwrap_or_else(|| naming(key.as_str()));
            properties.insert(
                name,
                render_intrinsics(value, attr.map(|a| &a.attr_type), &naming),
            );
        }

        let policy = resource
            .removal_policy
            .map(|p| p.as_engine_str().to_string());
        TemplateResource {
            resource_type: resource.resource_type().to_string(),
            properties,
            depends_on: resource.depends_on.iter().cloned().collect(),
            deletion_policy: policy.clone(),
            update_replace_policy: policy,
        }
    }
}

/// Render a value as engine JSON
///
/// Keys of struct-typed maps are renamed with `naming` (or the field's
/// provider name); keys of free-form maps are kept as written.
pub fn render_intrinsics(
    value: &Value,
    attr_type: Option<&AttributeType>,
    naming: &dyn Fn(&str) -> String,
) -> Json {
    match value {
        Value::String(s) => Json::String(s.clone()),
        Value::Int(n) => json!(n),
        Value::Float(n) => json!(n),
        Value::Bool(b) => Json::Bool(*b),
        Value::List(items) => {
            let inner = match attr_type {
                Some(AttributeType::List(inner)) => Some(inner.as_ref()),
                _ => None,
            };
            Json::Array(
                items
                    .iter()
                    .map(|item| render_intrinsics(item, inner, naming))
                    .collect(),
            )
        }
        Value::Map(map) => {
            let mut out = serde_json::Map::new();
            for (key, v) in map {
                let (name, inner) = match attr_type {
                    Some(t @ AttributeType::Struct { .. }) => {
                        let field = t.field(key);
                        let name = field
                            .and_then(|f| f.provider_name.clone())
                            .unwrap_or_else(|| naming(key.as_str()));
                        (name, field.map(|f| &f.attr_type))
                    }
                    Some(AttributeType::Map(inner)) => (key.clone(), Some(inner.as_ref())),
                    _ => (key.clone(), None),
                };
                out.insert(name, render_intrinsics(v, inner, naming));
            }
            Json::Object(out)
        }
        Value::Ref(id) => json!({ "Ref": id }),
        Value::GetAtt(id, attr) => json!({ "Fn::GetAtt": [id, attr] }),
        Value::Join { separator, parts } => {
            let parts: Vec<Json> = parts
                .iter()
                .map(|p| render_intrinsics(p, None, naming))
                .collect();
            json!({ "Fn::Join": [separator, parts] })
        }
        Value::Select { index, list } => {
            json!({ "Fn::Select": [index, render_intrinsics(list, None, naming)] })
        }
        Value::GetAzs => json!({ "Fn::GetAZs": "" }),
        Value::Pseudo(name) => json!({ "Ref": name }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::MockProvider;
    use crate::resource::RemovalPolicy;
    use crate::stack::Environment;

    fn stack_with(resource: Resource) -> Stack {
        let mut stack = Stack::new("Test", Environment::default())
            .unwrap()
            .with_description("test stack");
        stack.add_resource(resource).unwrap();
        stack
    }

    #[test]
    fn renders_properties_with_provider_names() {
        let stack = stack_with(
            Resource::new("Mock::Bucket", "Assets")
                .with_property("bucket_name", "assets")
                .with_property("db_name", "portal")
                .with_property("config", Value::map([("max_size", Value::Int(10))]))
                .with_property(
                    "labels",
                    Value::map([("team-name", Value::string("portal"))]),
                )
                .with_removal_policy(RemovalPolicy::Destroy),
        );

        let template = Synthesizer::new(MockProvider).synthesize(&stack).unwrap();
        let bucket = template.resource("Assets").unwrap();

        assert_eq!(bucket.resource_type, "Mock::Bucket");
        assert_eq!(bucket.property("BUCKET_NAME"), Some(&json!("assets")));
        assert_eq!(bucket.property("DBName"), Some(&json!("portal")));
        assert_eq!(bucket.property("CONFIG"), Some(&json!({ "MAX_SIZE": 10 })));
        // free-form map keys are preserved
        assert_eq!(bucket.property("LABELS"), Some(&json!({ "team-name": "portal" })));
        assert_eq!(bucket.deletion_policy.as_deref(), Some("Delete"));
        assert_eq!(template.description.as_deref(), Some("test stack"));
    }

    #[test]
    fn renders_intrinsics() {
        let naming = |k: &str| k.to_string();
        assert_eq!(
            render_intrinsics(&Value::reference("Vpc"), None, &naming),
            json!({ "Ref": "Vpc" })
        );
        assert_eq!(
            render_intrinsics(&Value::get_att("Db", "Endpoint.Port"), None, &naming),
            json!({ "Fn::GetAtt": ["Db", "Endpoint.Port"] })
        );
        assert_eq!(
            render_intrinsics(
                &Value::join(
                    "",
                    vec![Value::string("http://"), Value::get_att("Alb", "DNSName")],
                ),
                None,
                &naming
            ),
            json!({ "Fn::Join": ["", ["http://", { "Fn::GetAtt": ["Alb", "DNSName"] }]] })
        );
        assert_eq!(
            render_intrinsics(&Value::select(1, Value::GetAzs), None, &naming),
            json!({ "Fn::Select": [1, { "Fn::GetAZs": "" }] })
        );
        assert_eq!(
            render_intrinsics(&Value::pseudo("AWS::Region"), None, &naming),
            json!({ "Ref": "AWS::Region" })
        );
    }

    #[test]
    fn unknown_type_is_rejected_unless_allowed() {
        let stack = stack_with(Resource::new("Mock::Queue", "Jobs"));

        let strict = Synthesizer::new(MockProvider);
        assert!(matches!(
            strict.synthesize(&stack),
            Err(SynthError::UnknownResourceType { .. })
        ));

        let lenient = Synthesizer::new(MockProvider).with_config(SynthConfig {
            allow_unknown_types: true,
        });
        let template = lenient.synthesize(&stack).unwrap();
        assert!(template.resource("Jobs").is_some());
    }

    #[test]
    fn schema_errors_are_collected() {
        let stack =
            stack_with(Resource::new("Mock::Bucket", "Assets").with_property("db_name", 42i64));

        match Synthesizer::new(MockProvider).synthesize(&stack) {
            Err(SynthError::Schema(errors)) => {
                // missing bucket_name, wrong type for db_name
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().all(|(id, _)| id.name == "Assets"));
            }
            other => panic!("expected schema errors, got {:?}", other),
        }
    }

    #[test]
    fn graph_errors_come_first() {
        let stack = stack_with(
            Resource::new("Mock::Bucket", "Assets")
                .with_property("bucket_name", Value::reference("Missing")),
        );
        assert!(matches!(
            Synthesizer::new(MockProvider).synthesize(&stack),
            Err(SynthError::Stack(StackError::UnresolvedReference { .. }))
        ));
    }

    #[test]
    fn explicit_dependencies_render_as_depends_on() {
        let mut stack =
            stack_with(Resource::new("Mock::Bucket", "A").with_property("bucket_name", "a"));
        stack
            .add_resource(Resource::new("Mock::Bucket", "B").with_property("bucket_name", "b"))
            .unwrap();
        stack.add_dependency("B", "A").unwrap();

        let template = Synthesizer::new(MockProvider).synthesize(&stack).unwrap();
        assert_eq!(template.resource("B").unwrap().depends_on, vec!["A"]);
        assert!(template.resource("A").unwrap().depends_on.is_empty());
    }
}
