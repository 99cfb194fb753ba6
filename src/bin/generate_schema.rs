//! Generate JSON Schema for the sidebar configuration
//!
//! Usage:
//!   cargo run --features dev-bins --bin generate_schema > sidebar-config.schema.json

use anyhow::Result as AnyhowResult;
use repotree::SidebarConfig;
use schemars::schema_for;

fn main() -> AnyhowResult<()> {
    let schema = schema_for!(SidebarConfig);
    let output = serde_json::to_string_pretty(&schema)?;
    println!("{}", output);
    Ok(())
}
