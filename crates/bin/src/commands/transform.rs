//! Transform command - shows how one operation is rewritten against a concurrent one.

use std::fs;

use sharedoc::ops::{Operation, transform};

use crate::cli::TransformArgs;
use crate::output::{OutputFormat, print_json, print_table};

fn load_operation(path: &std::path::Path) -> Result<Operation, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}

/// Run the transform command
pub fn run(args: &TransformArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let op = load_operation(&args.op)?;
    let against = load_operation(&args.against)?;
    let transformed = transform(&op, &against, args.tie_break.into());
    tracing::debug!(%op, %against, results = transformed.len(), "transformed");

    match format {
        OutputFormat::Human => {
            if transformed.is_empty() {
                println!("{op} is absorbed by {against}");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = transformed
                .iter()
                .map(|t| vec![t.name().to_string(), t.to_string()])
                .collect();
            print_table(&["KIND", "OPERATION"], &rows);
        }
        OutputFormat::Json => print_json(&transformed)?,
    }

    Ok(())
}
