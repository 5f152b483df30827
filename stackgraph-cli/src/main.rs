use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use stackgraph_backstage::{BackstageProps, DEFAULT_STACK_NAME, backstage_stack};
use stackgraph_core::effect::Effect;
use stackgraph_core::graph::DependencyKind;
use stackgraph_core::plan::Plan;
use stackgraph_core::resource::Value;
use stackgraph_core::stack::{Environment, Stack};
use stackgraph_core::synth::Synthesizer;
use stackgraph_core::template::Template;
use stackgraph_provider_aws::AwsProvider;
use stackgraph_provider_aws::types::aws_region;

const DEFAULT_REGION: &str = "ap-south-1";
const MANIFEST_FILE: &str = "manifest.json";
const ASSEMBLY_VERSION: &str = "36.0.0";

#[derive(Parser)]
#[command(name = "stackgraph")]
#[command(about = "Build the Backstage stack and synthesize it into a CloudFormation template")]
#[command(long_about = None)]
struct Cli {
    /// Stack name
    #[arg(long, global = true, default_value = DEFAULT_STACK_NAME)]
    stack_name: String,

    /// Target AWS account
    #[arg(long, global = true, env = "CDK_DEFAULT_ACCOUNT")]
    account: Option<String>,

    /// Target AWS region (falls back to AWS_REGION, then ap-south-1)
    #[arg(long, global = true, env = "CDK_DEFAULT_REGION")]
    region: Option<String>,

    /// TOML file overriding the Backstage properties
    #[arg(long, global = true)]
    props: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize the template (to stdout, or a cloud assembly directory)
    Synth {
        /// Output directory for the template and manifest
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Validate the stack without writing anything
    Validate,
    /// Show each resource with the resources it depends on
    Graph,
    /// Show the order in which resources would be created
    Plan {
        /// Show the teardown order instead
        #[arg(long)]
        destroy: bool,
    },
    /// Compare a stored template with the synthesized one
    Diff {
        /// Path to a previously synthesized template
        template: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = build_stack(&cli).and_then(|stack| match &cli.command {
        Commands::Synth { output } => run_synth(&stack, output.as_deref()),
        Commands::Validate => run_validate(&stack),
        Commands::Graph => run_graph(&stack),
        Commands::Plan { destroy } => run_plan(&stack, *destroy),
        Commands::Diff { template } => run_diff(&stack, template),
    });

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Region from the flag or CDK_DEFAULT_REGION, then AWS_REGION, then the default
fn resolve_region(region: Option<&str>, fallback: Option<&str>) -> anyhow::Result<String> {
    let region = region.or(fallback).unwrap_or(DEFAULT_REGION);
    if let Err(e) = aws_region().validate(&Value::string(region)) {
        bail!("{}", e);
    }
    Ok(region.to_string())
}

fn load_props(path: Option<&Path>) -> anyhow::Result<BackstageProps> {
    match path {
        Some(path) => BackstageProps::load(path)
            .with_context(|| format!("Failed to load properties from {}", path.display())),
        None => Ok(BackstageProps::default()),
    }
}

fn build_stack(cli: &Cli) -> anyhow::Result<Stack> {
    let fallback = std::env::var("AWS_REGION").ok();
    let region = resolve_region(cli.region.as_deref(), fallback.as_deref())?;
    let environment = Environment::new(cli.account.clone(), Some(region));
    let props = load_props(cli.props.as_deref())?;

    log::info!(
        "building {} for {}",
        cli.stack_name,
        environment.uri("aws")
    );
    backstage_stack(&cli.stack_name, environment, &props)
        .with_context(|| format!("Failed to build stack {}", cli.stack_name))
}

fn synthesize(stack: &Stack) -> anyhow::Result<Template> {
    Synthesizer::new(AwsProvider)
        .synthesize(stack)
        .with_context(|| format!("Failed to synthesize stack {}", stack.name()))
}

fn run_synth(stack: &Stack, output: Option<&Path>) -> anyhow::Result<()> {
    let template = synthesize(stack)?;

    let Some(dir) = output else {
        println!("{}", template.to_json_pretty()?);
        return Ok(());
    };

    let written = write_assembly(dir, stack, &template)?;
    println!(
        "{}",
        format!(
            "✓ Synthesized {} ({} resources)",
            stack.name(),
            template.resources.len()
        )
        .green()
        .bold()
    );
    for path in written {
        println!("  • {}", path.display());
    }
    Ok(())
}

fn template_file_name(stack: &Stack) -> String {
    format!("{}.template.json", stack.name())
}

/// Write the template and a cloud assembly manifest pointing at it
fn write_assembly(dir: &Path, stack: &Stack, template: &Template) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let template_file = template_file_name(stack);
    let template_path = dir.join(&template_file);
    fs::write(&template_path, template.to_json_pretty()? + "\n")
        .with_context(|| format!("Failed to write {}", template_path.display()))?;

    let manifest = serde_json::json!({
        "version": ASSEMBLY_VERSION,
        "artifacts": {
            stack.name(): {
                "type": "aws:cloudformation:stack",
                "environment": stack.environment().uri("aws"),
                "properties": {
                    "templateFile": template_file,
                },
            },
        },
    });
    let manifest_path = dir.join(MANIFEST_FILE);
    let contents = serde_json::to_string_pretty(&manifest)? + "\n";
    fs::write(&manifest_path, contents)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    log::debug!("wrote assembly to {}", dir.display());
    Ok(vec![template_path, manifest_path])
}

fn run_validate(stack: &Stack) -> anyhow::Result<()> {
    println!("{}", "Validating...".cyan());

    Synthesizer::new(AwsProvider)
        .check(stack)
        .with_context(|| format!("Stack {} is invalid", stack.name()))?;

    println!(
        "{}",
        format!(
            "✓ {} resources validated successfully.",
            stack.resources().len()
        )
        .green()
        .bold()
    );
    for resource in stack.resources() {
        println!("  • {} {}", resource.resource_type(), resource.logical_id());
    }
    Ok(())
}

fn run_graph(stack: &Stack) -> anyhow::Result<()> {
    let graph = stack.validate()?;
    let order = graph
        .topological_order()
        .map_err(|cycle| anyhow::anyhow!("Cyclic dependency: {}", cycle.join(" -> ")))?;

    println!("{}", "Dependency Graph:".cyan().bold());
    println!();
    for id in &order {
        let Some(resource) = stack.resource(id) else {
            continue;
        };
        println!("{} {}", resource.resource_type().cyan(), id.bold());

        let dependencies = graph.dependencies_of(id);
        for (i, dependency) in dependencies.iter().enumerate() {
            let branch = if i == dependencies.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            let via = match &dependency.kind {
                DependencyKind::Reference { used_in } => used_in.dimmed(),
                DependencyKind::Explicit => "depends on".yellow(),
            };
            println!("  {} {} ({})", branch, dependency.target, via);
        }
    }
    println!();
    println!(
        "{} resources, {} roots",
        order.len(),
        graph.roots().len()
    );
    Ok(())
}

fn format_effect(effect: &Effect) -> String {
    let id = effect.resource_id();
    match effect {
        Effect::Create(_) => format!(
            "{} {} {}",
            "+".green().bold(),
            id.resource_type.cyan(),
            id.name
        ),
        Effect::Delete(_) => format!(
            "{} {} {}",
            "-".red().bold(),
            id.resource_type.cyan(),
            id.name
        ),
        Effect::Retain(_) => format!(
            "{} {} {} {}",
            "=".yellow().bold(),
            id.resource_type.cyan(),
            id.name,
            "(retained)".yellow()
        ),
    }
}

fn run_plan(stack: &Stack, destroy: bool) -> anyhow::Result<()> {
    let plan = if destroy {
        Plan::destroy(stack)?
    } else {
        Plan::deploy(stack)?
    };

    if plan.is_empty() {
        println!("{}", "No resources in stack.".green());
        return Ok(());
    }

    let title = if destroy {
        "Destroy Plan:"
    } else {
        "Execution Plan:"
    };
    println!("{}", title.cyan().bold());
    println!();
    for (i, effect) in plan.effects().iter().enumerate() {
        println!("{:>4}. {}", i + 1, format_effect(effect));
    }

    println!();
    println!("{}", plan.summary().to_string().bold());
    Ok(())
}

fn run_diff(stack: &Stack, path: &Path) -> anyhow::Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let stored = Template::from_json(&content)
        .with_context(|| format!("{} is not a template", path.display()))?;

    // both sides go through the same serializer so only content differs
    let old = stored.to_json_pretty()?;
    let new = synthesize(stack)?.to_json_pretty()?;

    let (insertions, deletions) = count_changes(&old, &new);
    if insertions == 0 && deletions == 0 {
        println!("{}", "No differences.".green());
        return Ok(());
    }

    print_diff(&old, &new);
    println!();
    println!(
        "{} lines added, {} lines removed",
        insertions.to_string().green(),
        deletions.to_string().red()
    );
    Ok(())
}

/// Number of inserted and deleted lines between two texts
fn count_changes(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .fold((0, 0), |(ins, del), change| match change.tag() {
            ChangeTag::Insert => (ins + 1, del),
            ChangeTag::Delete => (ins, del + 1),
            ChangeTag::Equal => (ins, del),
        })
}

fn print_diff(old: &str, new: &str) {
    let diff = TextDiff::from_lines(old, new);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => " ".normal(),
        };
        print!("{}{}", sign, change);
        if change.missing_newline() {
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn stack() -> Stack {
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

    #[test]
    fn region_resolution_order() {
        assert_eq!(
            resolve_region(Some("us-east-1"), Some("eu-west-1")).unwrap(),
            "us-east-1"
        );
        assert_eq!(resolve_region(None, Some("eu-west-1")).unwrap(), "eu-west-1");
        assert_eq!(resolve_region(None, None).unwrap(), DEFAULT_REGION);
        assert!(resolve_region(Some("mars-north-1"), None).is_err());
        assert!(resolve_region(Some("ap-south-1a"), None).is_err());
    }

    #[test]
    fn newer_regions_are_accepted() {
        for region in ["ap-east-1", "ap-south-2", "il-central-1", "us-gov-east-1"] {
            assert_eq!(resolve_region(Some(region), None).unwrap(), region);
        }
    }

    #[test]
    fn stack_name_cannot_leave_the_output_directory() {
        let cli = Cli::try_parse_from(["stackgraph", "synth", "--stack-name", "../escaped"])
            .unwrap();
        let err = build_stack(&cli).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid stack name '../escaped'"));
    }

    #[test]
    fn props_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "desired_count = 2").unwrap();

        let props = load_props(Some(file.path())).unwrap();
        assert_eq!(props.desired_count, 2);
        assert_eq!(load_props(None).unwrap(), BackstageProps::default());
        assert!(load_props(Some(Path::new("/nonexistent.toml"))).is_err());
    }

    #[test]
    fn assembly_contains_template_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let stack = stack();
        let template = synthesize(&stack).unwrap();

        let written = write_assembly(dir.path(), &stack, &template).unwrap();
        assert_eq!(written.len(), 2);

        let template_path = dir.path().join("BackstageEcsStack.template.json");
        let stored = Template::from_json(&fs::read_to_string(&template_path).unwrap()).unwrap();
        assert_eq!(stored, template);

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        let artifact = &manifest["artifacts"]["BackstageEcsStack"];
        assert_eq!(artifact["environment"], "aws://123456789012/ap-south-1");
        assert_eq!(
            artifact["properties"]["templateFile"],
            "BackstageEcsStack.template.json"
        );
    }

    #[test]
    fn diff_counts_changed_lines() {
        assert_eq!(count_changes("a\nb\n", "a\nb\n"), (0, 0));
        assert_eq!(count_changes("a\nb\n", "a\nc\n"), (1, 1));

        let template = synthesize(&stack()).unwrap().to_json_pretty().unwrap();
        let mut changed = stack();
        changed
            .resource_mut("BackstageService")
            .unwrap()
            .set_property("desired_count", 2u32);
        let other = synthesize(&changed).unwrap().to_json_pretty().unwrap();
        assert_eq!(count_changes(&template, &other), (1, 1));
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stackgraph",
            "plan",
            "--destroy",
            "--stack-name",
            "Portal",
            "--region",
            "us-west-2",
        ])
        .unwrap();
        assert_eq!(cli.stack_name, "Portal");
        assert_eq!(cli.region.as_deref(), Some("us-west-2"));
        assert!(matches!(cli.command, Commands::Plan { destroy: true }));
    }
}
