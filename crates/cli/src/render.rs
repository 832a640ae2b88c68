use crate::session::CalcOutcome;
use anyhow::Result;
use console::style;
use perimeter_formulas::Figure;
use perimeter_history::{AggregateSnapshot, HistoryError, RecordView};
use serde::Serialize;
use serde_json::Value;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub fn print_outcome(outcome: &CalcOutcome) {
    println!(
        "{} perimeter = {}",
        outcome.figure.label(),
        style(format_number(outcome.perimeter)).green().bold()
    );
    if let Some(err) = &outcome.record_error {
        eprintln!("{} result not saved: {err}", style("warning:").yellow().bold());
    }
}

/// Goes to stderr so `--json` output stays parseable.
pub fn print_load_warning(warning: Option<&HistoryError>) {
    if let Some(err) = warning {
        eprintln!("{} history not fully read: {err}", style("warning:").yellow().bold());
    }
}

pub fn print_records(records: &[RecordView]) {
    if records.is_empty() {
        println!("{}", style("No saved records yet.").dim());
        return;
    }
    for (idx, view) in records.iter().enumerate() {
        println!(
            "{:>3}. {}  {:<22} {:>10}  {}",
            idx + 1,
            style(&view.timestamp).dim(),
            style(&view.figure).cyan(),
            style(render_value(&view.perimeter)).green(),
            render_value(&view.parameters)
        );
    }
}

pub fn print_stats(snapshot: &AggregateSnapshot) {
    println!("{}", style("History statistics").bold().underlined());
    println!("  records            {}", snapshot.total);
    println!("  numeric perimeters {}", snapshot.numeric_count);
    println!("  average            {}", option_number(snapshot.average));
    println!("  min                {}", option_number(snapshot.min));
    println!("  max                {}", option_number(snapshot.max));
    match &snapshot.most_frequent_figure {
        Some(top) => println!(
            "  most frequent      {} ({}x)",
            style(&top.figure).cyan(),
            top.count
        ),
        None => println!("  most frequent      none"),
    }
    for entry in &snapshot.figure_counts {
        println!("    {:<22} {}", entry.figure, entry.count);
    }
}

pub fn print_figures() {
    for figure in Figure::ALL {
        println!(
            "{:<22} {:<22} {}",
            style(figure.as_str()).cyan(),
            figure.label(),
            figure.parameter_names().join(", ")
        );
    }
}

fn option_number(value: Option<f64>) -> String {
    value.map_or_else(|| "no data".to_string(), format_number)
}

fn format_number(value: f64) -> String {
    format!("{value:.2}")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), format_number),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}={}", render_value(v)))
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
