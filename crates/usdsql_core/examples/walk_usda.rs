//! Example: Walk a USDA file and print its prim hierarchy.
//!
//! Run with: cargo run --example walk_usda -- path/to/scene.usda

use std::env;

use usdsql_core::usd::{Asset, ReaderOptions, WalkOptions};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: walk_usda <path-to-usda-file>");
        return;
    }

    let path = &args[1];
    let asset = match Asset::open(path, &ReaderOptions::default()) {
        Ok(asset) => asset,
        Err(e) => {
            eprintln!("Failed to open {}: {}", path, e);
            std::process::exit(1);
        }
    };

    if let Some(stage) = asset.stage() {
        let metadata = stage.metadata();
        println!("=== {} ===", path);
        println!("Default prim: {}", metadata.default_prim.as_deref().unwrap_or("-"));
        println!("Up axis: {}", metadata.up_axis.as_deref().unwrap_or("-"));
    }

    let walker = match asset.traverse(&WalkOptions::default()) {
        Ok(walker) => walker,
        Err(e) => {
            eprintln!("Failed to walk {}: {}", path, e);
            std::process::exit(1);
        }
    };

    let mut count = 0;
    for walked in walker {
        match walked {
            Ok(walked) => {
                let prim = walked.prim();
                let type_name = if prim.type_name().is_empty() { "-" } else { prim.type_name() };
                println!("{}{} ({})", "  ".repeat(walked.depth()), walked.path(), type_name);
                count += 1;
            }
            Err(e) => {
                eprintln!("Traversal failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!("\n{} prims", count);
}
