//! Run summary rendering.
//!
//! The console report lists the particle species seen at the tracker with
//! a bar proportional to their share, followed by the hit position
//! statistics. The same summary can be saved as Markdown or JSON.

use crate::models::{AxisStatistics, RunSummary, SpeciesCount};
use anyhow::Result;
use std::path::Path;

/// Glyph used for the species bars.
const BAR_GLYPH: char = '#';

/// Bar of one glyph per whole percent of `total`.
fn species_bar(species: &SpeciesCount, total: u64) -> String {
    std::iter::repeat(BAR_GLYPH)
        .take(species.percent_of(total))
        .collect()
}

fn format_axis(axis: &str, stats: Option<&AxisStatistics>) -> String {
    match stats {
        None => format!("Average {} = undefined (no tracker hits)", axis),
        Some(s) => match (s.variance, s.std_dev()) {
            (Some(variance), Some(std_dev)) => format!(
                "Average {} = {:.6} [mm], variance = {:.6} [mm^2], std dev = {:.6} [mm]",
                axis, s.mean, variance, std_dev
            ),
            _ => format!(
                "Average {} = {:.6} [mm], variance undefined (fewer than 2 hits)",
                axis, s.mean
            ),
        },
    }
}

/// Generate the plain text report printed at the end of a run.
pub fn generate_text_report(summary: &RunSummary) -> String {
    let mut output = String::new();

    output.push_str("Got types at tracker:\n");
    if summary.species.is_empty() {
        output.push_str("  (none)\n");
    }
    for species in &summary.species {
        output.push_str(&format!(
            "{:>15} = {:>15}: {:>15} = {}\n",
            species.pdg,
            species.name,
            species.count,
            species_bar(species, summary.total_hits)
        ));
    }

    output.push('\n');
    output.push_str(&format_axis("x", summary.x.as_ref()));
    output.push('\n');
    output.push_str(&format_axis("y", summary.y.as_ref()));
    output.push('\n');

    output
}

/// Generate a Markdown run summary.
pub fn generate_markdown_report(summary: &RunSummary) -> String {
    let mut output = String::new();

    output.push_str("# MiniScatter Run Summary\n\n");
    output.push_str(&generate_metadata_section(summary));
    output.push_str(&generate_species_section(summary));
    output.push_str(&generate_statistics_section(summary));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(summary: &RunSummary) -> String {
    let metadata = &summary.metadata;
    let geometry = &metadata.geometry;
    let mut section = String::new();

    section.push_str("## Run\n\n");
    section.push_str(&format!("- **Output:** `{}`\n", summary.output_path.display()));
    section.push_str(&format!(
        "- **Started:** {}\n",
        metadata.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Events:** {}\n", summary.events));
    section.push_str(&format!("- **Tracker hits:** {}\n", summary.total_hits));
    section.push_str(&format!(
        "- **Target:** {} mm of {}\n",
        geometry.target_thickness, geometry.target_material
    ));
    match geometry.detector_angle {
        Some(angle) => section.push_str(&format!(
            "- **Detector:** {} mm, rotated {} deg\n",
            geometry.detector_distance, angle
        )),
        None => section.push_str(&format!(
            "- **Detector:** {} mm\n",
            geometry.detector_distance
        )),
    }
    section.push_str(&format!(
        "- **Beam:** {} MeV {}, offset {} mm\n",
        geometry.beam_energy, geometry.beam_type, geometry.beam_offset
    ));
    section.push_str(&format!("- **Physics list:** `{}`\n", geometry.physics_list));
    section.push_str(&format!("- **Duration:** {:.1}s\n", summary.duration_seconds));
    section.push('\n');

    section
}

/// Generate the species table.
fn generate_species_section(summary: &RunSummary) -> String {
    let mut section = String::new();

    section.push_str("## Particles at the Tracker\n\n");

    if summary.species.is_empty() {
        section.push_str("No particles reached the tracker.\n\n");
        return section;
    }

    section.push_str("| PDG | Name | Hits | Share |\n");
    section.push_str("|---:|:---|---:|:---|\n");
    for species in &summary.species {
        section.push_str(&format!(
            "| {} | {} | {} | `{}` {}% |\n",
            species.pdg,
            species.name,
            species.count,
            species_bar(species, summary.total_hits),
            species.percent_of(summary.total_hits)
        ));
    }
    section.push('\n');

    section
}

/// Generate the position statistics section.
fn generate_statistics_section(summary: &RunSummary) -> String {
    let mut section = String::new();

    section.push_str("## Hit Position\n\n");
    section.push_str(&format!("- {}\n", format_axis("x", summary.x.as_ref())));
    section.push_str(&format!("- {}\n", format_axis("y", summary.y.as_ref())));
    section.push('\n');

    section
}

/// Generate a JSON run summary.
pub fn generate_json_report(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).map_err(Into::into)
}

/// Write a report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    use anyhow::Context;

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary to {}", path.display()))
}
