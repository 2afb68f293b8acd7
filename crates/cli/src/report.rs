//! `absentia report` — summarize one state extract without touching the
//! store.

use std::path::PathBuf;

use absentia_io::normalize::normalize_state_row;
use absentia_io::state::read_state_extract;
use absentia_recon::report::{build_report, ExtractReport, PartyTotals};

use crate::CliError;

pub fn cmd_report(file: PathBuf, json: bool) -> Result<(), CliError> {
    let extract = read_state_extract(&file).map_err(|e| CliError::extract(e.to_string()))?;

    let rows: Vec<_> = extract
        .voters
        .iter()
        .flat_map(|(reg, rows)| rows.iter().map(|r| normalize_state_row(*reg, r)))
        .collect();

    let report = build_report(rows.iter(), extract.stats.dropped_missing_fields);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|e| CliError::io(e.to_string()))?
        );
        return Ok(());
    }

    render_human(&report);
    Ok(())
}

fn party_line(label: &str, totals: &PartyTotals) -> String {
    format!(
        "  {label}: {} tracked; {} received ({:.2}%); {} rejected ({:.2}%)",
        totals.tracked,
        totals.received,
        totals.return_pct(),
        totals.rejected,
        totals.rejection_pct(),
    )
}

fn render_human(report: &ExtractReport) {
    println!("TOTALS");
    println!("{}", party_line("Democrats  ", &report.totals.dem));
    println!("{}", party_line("Republicans", &report.totals.rep));
    println!("{}", party_line("Others     ", &report.totals.oth));
    println!("\nMissing first, last, or address: {}", report.missing_primary);

    // top counties by rejected Democratic ballots
    let mut by_dem_rejections: Vec<_> = report
        .by_county
        .iter()
        .filter(|(_, c)| c.dem.rejected > 0)
        .collect();
    by_dem_rejections.sort_by(|a, b| b.1.dem.rejected.cmp(&a.1.dem.rejected));

    if !by_dem_rejections.is_empty() {
        println!("\nTOP COUNTIES BY REJECTED DEMOCRATIC BALLOTS");
        for (name, county) in by_dem_rejections.iter().take(5) {
            println!("  {name}");
            println!("  {}", party_line("Dem", &county.dem));
            println!("  {}", party_line("Rep", &county.rep));
            println!("  {}", party_line("Oth", &county.oth));
        }
    }

    let silent = report.counties_not_reporting();
    println!("\n{} counties reporting no rejections; highest volume first:", silent.len());
    for (name, received) in silent.iter().take(10) {
        println!("  {name}: {received} ballots received");
    }
}
