use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, CellAlignment, ContentArrangement, Table};
use rttbench_peer::{format_report, RunConfig, RunOutcome, Summary, Termination};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RunReport<'a> {
    addr: String,
    message_bytes: usize,
    count: u64,
    warmup: u64,
    sent: u64,
    received: u64,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    samples: usize,
    summary: Option<Summary>,
}

pub fn print_report(outcome: &RunOutcome, config: &RunConfig, format: OutputFormat) {
    println!("{}", render_report(outcome, config, format));
}

pub fn render_report(outcome: &RunOutcome, config: &RunConfig, format: OutputFormat) -> String {
    let summary = outcome.summary();
    match format {
        OutputFormat::Json => {
            let report = RunReport {
                addr: config.addr(),
                message_bytes: config.message.len(),
                count: outcome.total,
                warmup: config.effective_warmup(),
                sent: outcome.sent,
                received: outcome.received,
                status: status_name(&outcome.termination),
                error: match &outcome.termination {
                    Termination::Failed(reason) => Some(reason.as_str()),
                    _ => None,
                },
                samples: outcome.samples.len(),
                summary,
            };
            serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => render_table(summary.as_ref()),
        OutputFormat::Pretty => format_report(summary.as_ref()),
    }
}

fn render_table(summary: Option<&Summary>) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["METRIC", "VALUE"]);

    match summary {
        Some(s) => {
            table.add_row(vec!["samples".to_string(), s.samples.to_string()]);
            for (name, value) in [
                ("min", s.min_us),
                ("p50", s.p50_us),
                ("p90", s.p90_us),
                ("p99", s.p99_us),
                ("max", s.max_us),
                ("avg", s.avg_us),
            ] {
                table.add_row(vec![name.to_string(), format!("{value:.2} µs")]);
            }
        }
        None => {
            table.add_row(vec!["samples", "0"]);
            table.add_row(vec!["result", "no data"]);
        }
    }

    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    table.to_string()
}

pub fn status_name(termination: &Termination) -> &'static str {
    match termination {
        Termination::Completed => "completed",
        Termination::PeerClosed => "peer_closed",
        Termination::TimedOut(_) => "timed_out",
        Termination::Failed(_) => "failed",
    }
}
