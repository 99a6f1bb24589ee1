//! Report rendering: Prolog-style text or a JSON document

use std::fmt::Write;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::exec::{Answer, QueryOutcome, Report};

/// Render a report in the requested format
pub fn render(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

/// One block per query:
///
/// ```text
/// ?- parent(tom, X).
/// % X = bob
/// % X = liz
/// ```
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    for outcome in &report.queries {
        write_outcome(&mut out, outcome);
    }
    out
}

fn write_outcome(out: &mut String, outcome: &QueryOutcome) {
    let _ = writeln!(out, "?- {}.", outcome.query);
    if let Some(sql) = &outcome.sql {
        let _ = writeln!(out, "% sql: {}", sql);
    }
    match &outcome.answer {
        Answer::Yes => out.push_str("% yes\n"),
        Answer::No => out.push_str("% no\n"),
        Answer::Rows { rows, .. } if rows.is_empty() => out.push_str("% no\n"),
        Answer::Rows { columns, rows } => {
            for row in rows {
                let pairs: Vec<String> = columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| format!("{} = {}", column, value))
                    .collect();
                let _ = writeln!(out, "% {}", pairs.join(", "));
            }
        }
        Answer::Error { message } => {
            let _ = writeln!(out, "% error: {}", message);
        }
    }
}
