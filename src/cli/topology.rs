use anyhow::{Context, Result};
use std::path::Path;

use crate::app::load_config;
use crate::topology::Topology;

pub fn handle_topology_command(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let topology = Topology::assemble(&config);
    let json = topology
        .to_json_pretty()
        .context("Failed to serialize topology")?;
    println!("{}", json);
    Ok(())
}
