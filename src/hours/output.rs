use super::TimeFormat;
use crate::model::{
    CellLine, CellOutput, DateTotalOutput, MatrixOutput, ResultMatrix, RowOutput, TotalsOutput, WindowKind,
    WindowOutput, SCHEMA_VERSION,
};
use anyhow::Result;
use chrono::Utc;
use console::style;
use std::path::Path;

const EMPTY_CELL: &str = "-";

pub fn to_output(matrix: &ResultMatrix, root: &Path, format: TimeFormat, show_summary: bool) -> MatrixOutput {
    let rows = matrix
        .repositories
        .iter()
        .map(|(name, results)| {
            let total = matrix.repository_total(name).display_seconds;
            RowOutput {
                repository: name.clone(),
                cells: results
                    .iter()
                    .map(|result| CellOutput {
                        date: result.date,
                        raw_seconds: result.raw_seconds,
                        display_seconds: result.display_seconds,
                        formatted: format.format(result.display_seconds),
                        summary: if show_summary {
                            result.summary_text.clone()
                        } else {
                            String::new()
                        },
                    })
                    .collect(),
                total_seconds: total,
                total_formatted: format.format(total),
            }
        })
        .collect();

    let grand = matrix.grand_total().display_seconds;
    MatrixOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        root: root.to_string_lossy().to_string(),
        author: matrix.author.clone(),
        window: WindowOutput {
            kind: matrix.window.kind,
            start: matrix.window.start,
            end: matrix.window.end,
            dates: matrix.window.dates.clone(),
        },
        rows,
        totals: TotalsOutput {
            by_date: matrix
                .date_totals()
                .into_iter()
                .map(|(date, totals)| DateTotalOutput {
                    date,
                    display_seconds: totals.display_seconds,
                    formatted: format.format(totals.display_seconds),
                })
                .collect(),
            grand_seconds: grand,
            grand_formatted: format.format(grand),
        },
    }
}

pub fn output_json(output: &MatrixOutput) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

pub fn output_ndjson(output: &MatrixOutput) -> Result<()> {
    for row in &output.rows {
        for cell in &row.cells {
            let line = CellLine {
                repository: row.repository.clone(),
                cell: cell.clone(),
            };
            println!("{}", serde_json::to_string(&line)?);
        }
    }
    Ok(())
}

pub fn output_table(output: &MatrixOutput, show_summary: bool) -> Result<()> {
    println!(
        "Results for {} to {}",
        style(output.window.start.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")).dim(),
        style(output.window.end.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")).dim()
    );
    println!("Git Username: {}\n", style(&output.author).cyan());

    if output.rows.is_empty() {
        println!("No activity found for the specified period.");
        return Ok(());
    }

    match output.window.kind {
        WindowKind::Day => day_table(output, show_summary),
        WindowKind::Week => week_table(output, show_summary),
    }
    Ok(())
}

fn day_table(output: &MatrixOutput, show_summary: bool) {
    println!("{:<30} {:>8}  {}", style("Repository").bold(), style("Hours").bold(), style("Summary").bold());
    println!("{}", "─".repeat(80));
    for row in &output.rows {
        let summary = row.cells.first().map(|c| c.summary.as_str()).unwrap_or_default();
        println!(
            "{:<30} {:>8}  {}",
            row.repository,
            style(&row.total_formatted).green(),
            if show_summary { summary } else { "" }
        );
    }
    println!("{}", "─".repeat(80));
    println!("{:<30} {:>8}", style("Total").bold(), style(&output.totals.grand_formatted).green().bold());
}

fn week_table(output: &MatrixOutput, show_summary: bool) {
    let dates = &output.window.dates;
    let mut header = format!("{:<24}", "Repository");
    for date in dates {
        header.push_str(&format!(" {:>9}", date.format("%a %d").to_string()));
    }
    header.push_str(&format!(" {:>9}", "Total"));
    println!("{}", style(header).bold());
    println!("{}", "─".repeat(24 + 10 * (dates.len() + 1)));

    for row in &output.rows {
        let mut line = format!("{:<24}", row.repository);
        for date in dates {
            let cell = row
                .cells
                .iter()
                .find(|c| c.date == *date)
                .map(|c| c.formatted.as_str())
                .unwrap_or(EMPTY_CELL);
            line.push_str(&format!(" {cell:>9}"));
        }
        line.push_str(&format!(" {:>9}", row.total_formatted));
        println!("{line}");
    }

    println!("{}", "─".repeat(24 + 10 * (dates.len() + 1)));
    let mut totals = format!("{:<24}", "Total");
    for total in &output.totals.by_date {
        totals.push_str(&format!(" {:>9}", total.formatted));
    }
    totals.push_str(&format!(" {:>9}", output.totals.grand_formatted));
    println!("{}", style(totals).bold());

    if !show_summary {
        return;
    }
    println!("\n{}", style("Summaries").bold());
    for row in &output.rows {
        for cell in row.cells.iter().filter(|c| !c.summary.is_empty()) {
            println!(
                "  {} {}: {}",
                style(cell.date.format("%a %Y-%m-%d")).dim(),
                row.repository,
                cell.summary
            );
        }
    }
}
