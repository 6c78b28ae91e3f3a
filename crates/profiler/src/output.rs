//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use profiler_lib::cluster::Elbow;
use profiler_lib::{RunSummary, SseCurve};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Tabled)]
struct SseRow {
    #[tabled(rename = "K")]
    k: usize,
    #[tabled(rename = "SSE")]
    sse: String,
}

#[derive(Tabled)]
struct AssignmentRow {
    #[tabled(rename = "Workload")]
    workload: usize,
    #[tabled(rename = "Cluster")]
    cluster: usize,
    #[tabled(rename = "Profile")]
    label: String,
    #[tabled(rename = "Distance²")]
    distance_sq: String,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to serialize output: {}", e)),
    }
}

fn sse_rows(sse: &SseCurve, elbow: Option<usize>) -> Vec<SseRow> {
    sse.values()
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let formatted = format!("{:.4}", v);
            SseRow {
                k: i + 1,
                sse: if elbow == Some(i + 1) {
                    formatted.green().bold().to_string()
                } else {
                    formatted
                },
            }
        })
        .collect()
}

/// Print the result of a full pipeline run
pub fn print_summary(summary: &RunSummary, format: OutputFormat) {
    if let OutputFormat::Json = format {
        print_json(summary);
        return;
    }

    let report = &summary.report;
    println!("{} {}", "Run".bold(), summary.run_id);
    println!(
        "  rows scaled: {}   model: {} (K={})",
        summary.rows_scaled,
        summary.model_path.display(),
        report.model_k
    );
    println!();

    let table = Table::new(sse_rows(&summary.sse, report.elbow.k()))
        .with(Style::rounded())
        .to_string();
    println!("{}", table);

    for k in &summary.monotonicity_violations {
        print_warning(&format!("SSE rose at K={}", k));
    }
    print_elbow(&report.elbow);
    println!();

    let rows: Vec<AssignmentRow> = report
        .assignments
        .iter()
        .map(|a| AssignmentRow {
            workload: a.row + 1,
            cluster: a.cluster,
            label: color_label(&a.label),
            distance_sq: format!("{:.4}", a.distance_sq),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    print_success(&format!(
        "First workload assigned to cluster {} in {:.2}s",
        report.first_cluster, summary.duration_secs
    ));
}

/// Print the elbow selection outcome
pub fn print_elbow(elbow: &Elbow) {
    match elbow {
        Elbow::Found { k } => print_info(&format!("Optimal number of workload clusters: {}", k)),
        Elbow::Undefined { reason } => print_warning(&format!("Optimal K undefined: {}", reason)),
    }
}

/// Color a profile label
pub fn color_label(label: &str) -> String {
    match label {
        "Profile-A" => label.red().to_string(),
        "Profile-B" => label.blue().to_string(),
        "Profile-C" => label.magenta().to_string(),
        "Profile-D" => label.green().to_string(),
        _ => label.to_string(),
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_rows_are_one_based() {
        colored::control::set_override(false);
        let rows = sse_rows(&SseCurve(vec![10.0, 4.0, 3.5]), Some(2));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].k, 1);
        assert_eq!(rows[1].sse, "4.0000");
    }

    #[test]
    fn test_unknown_labels_uncolored() {
        assert_eq!(color_label("Cluster-7"), "Cluster-7");
    }
}
