//! Example: Run a USD table function and print the result.
//!
//! Run with: cargo run --example query_usd -- scene.usda [function] [limit] [config.json]
//!
//! `function` defaults to `usd_prims`.

use std::env;

use anyhow::{bail, Context, Result};
use usdsql_ext::host::{FunctionRegistry, ScanRequest, Value};
use usdsql_ext::{UsdConfig, UsdExtension};

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: query_usd <path-to-usd-file> [function] [limit] [config.json]");
        return Ok(());
    }

    let config = match args.get(4) {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path))?;
            UsdConfig::from_json(&json)?
        }
        None => UsdConfig::default(),
    };

    let mut registry = FunctionRegistry::new();
    UsdExtension::with_config(&mut registry, config);

    let function = args.get(2).map(String::as_str).unwrap_or("usd_prims");
    if !registry.contains(function) {
        let names: Vec<&str> = registry.names().collect();
        bail!("Unknown function {} (available: {})", function, names.join(", "));
    }

    let limit = match args.get(3) {
        Some(limit) => Some(limit.parse::<usize>().context("limit must be a number")?),
        None => None,
    };

    let request = ScanRequest {
        limit,
        ..Default::default()
    };
    let result = registry
        .run(function, &[Value::from(args[1].as_str())], request)
        .with_context(|| format!("{} failed", function))?;

    let header: Vec<String> = result
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.logical_type))
        .collect();
    println!("{}", header.join("\t"));
    for row in &result.rows {
        let line: Vec<String> = row.iter().map(Value::to_string).collect();
        println!("{}", line.join("\t"));
    }
    println!("\n{} rows", result.rows.len());

    Ok(())
}
