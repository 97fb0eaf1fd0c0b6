use std::fs;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use userprops::UserProperties;

use crate::cli::PropsArgs;

pub fn run(args: &PropsArgs) -> Result<()> {
    let contents = fs::read_to_string(&args.project)
        .with_context(|| format!("failed to read {}", args.project.display()))?;
    let mut props = UserProperties::from_project_json(&contents)
        .with_context(|| format!("failed to load properties from {}", args.project.display()))?;
    props.apply_overrides(args.overrides.iter().cloned());

    match (&args.name, &args.condition) {
        (Some(name), Some(condition)) => {
            println!("{}", props.matches_condition(condition, name));
        }
        (Some(name), None) => {
            let value = props
                .get(name)
                .ok_or_else(|| anyhow!("unknown property '{name}'"))?;
            println!("{}", display_value(value));
        }
        (None, _) => {
            if props.is_empty() {
                println!("No user properties defined.");
            }
            for (name, value) in props.iter() {
                println!("{name} = {}", display_value(value));
            }
        }
    }
    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
