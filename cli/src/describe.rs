//! Preset flow inspection

use anyhow::{Context, Result};
use turnstile::core::{NodeKind, Schematic};
use turnstile::std::FlowPreset;

pub fn run_describe_command(preset: FlowPreset, json: bool) -> Result<()> {
    let schematic = preset.chain().schematic();

    if json {
        let output =
            serde_json::to_string_pretty(&schematic).context("Failed to serialize schematic")?;
        println!("{output}");
    } else {
        print!("{}", render(&schematic));
    }
    Ok(())
}

/// One line per node in chain order.
fn render(schematic: &Schematic) -> String {
    let mut out = format!("{} ({} gates)\n", schematic.name, schematic.gates().count());
    let mut gate = 0;
    for node in &schematic.nodes {
        let line = match node.kind {
            NodeKind::Trigger => format!("  > {}\n", node.label),
            NodeKind::Gate => {
                let line = format!(
                    "  {gate}. {} [{}]{}\n",
                    node.label,
                    node.id,
                    if node.is_async { " (async)" } else { "" }
                );
                gate += 1;
                line
            }
            NodeKind::Terminal => format!("  = {}\n", node.label),
        };
        out.push_str(&line);
    }
    out
}
