//! Stage listing and information command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use cadence_registry::{StageCategory, StageRegistry};
use clap::Args;

use super::common::describe_range;

#[derive(Args)]
pub struct StagesArgs {
    /// Show details for a specific stage type
    #[arg(value_name = "STAGE")]
    stage: Option<String>,
}

const CATEGORIES: [StageCategory; 5] = [
    StageCategory::Utility,
    StageCategory::Dynamics,
    StageCategory::TimeBased,
    StageCategory::Spectral,
    StageCategory::Analysis,
];

pub fn run(args: StagesArgs) -> anyhow::Result<()> {
    let registry = StageRegistry::new();

    if let Some(id) = &args.stage {
        let descriptor = registry
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("Unknown stage type: {}", id))?;
        let params = registry.params(descriptor.id).unwrap_or_default();

        println!("{} ({})", descriptor.name, descriptor.id);
        println!("{}", "=".repeat(descriptor.name.len() + descriptor.id.len() + 3));
        println!();
        println!("{}", descriptor.description);
        println!("Category: {}", descriptor.category.name());
        println!("Accepts:  {:?}", descriptor.accepts);
        println!();

        if params.is_empty() {
            println!("No parameters.");
        } else {
            println!("Parameters:");
            println!();
            println!(
                "  {:14}  {:36}  {:12}  {}",
                "Name", "Description", "Default", "Range"
            );
            println!(
                "  {:14}  {:36}  {:12}  {}",
                "----", "-----------", "-------", "-----"
            );
            for param in &params {
                println!(
                    "  {:14}  {:36}  {:12}  {}",
                    param.name,
                    param.description,
                    param.default.to_string(),
                    describe_range(param)
                );
            }
        }

        println!();
        println!("Example chain entry:");
        println!();
        println!("  [[stages]]");
        println!("  type = \"{}\"", descriptor.id);
        if let Some(param) = params.first() {
            println!("  [stages.params]");
            println!("  {} = {}", param.name, toml_literal(&param.default));
        }
    } else {
        println!("Available Stages");
        println!("================");

        for category in CATEGORIES {
            let stages = registry.stages_in_category(category);
            if stages.is_empty() {
                continue;
            }
            println!();
            println!("{}:", category.name());
            for stage in stages {
                println!("  {:18} - {}", stage.id, stage.description);
            }
        }

        println!();
        println!("Use 'cadence stages <name>' for detailed parameter info.");
    }

    Ok(())
}

fn toml_literal(value: &cadence_core::ParamValue) -> String {
    use cadence_core::ParamValue;
    match value {
        ParamValue::Text(text) => format!("\"{text}\""),
        ParamValue::Float(v) if v.fract() == 0.0 => format!("{v:.1}"),
        ParamValue::Vector(items) => format!(
            "[{}]",
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        other => other.to_string(),
    }
}
