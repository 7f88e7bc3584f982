use std::io::{self, Write};

use serde::Serialize;

use crate::autocomplete::Autocompletion;
use crate::context::{ExecutionReport, ReportChannel};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_completions(result: &[Autocompletion]) -> io::Result<()> {
        Self::print_json(&result)
    }

    pub fn print_report(report: &ExecutionReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct StderrReport;

impl ReportChannel for StderrReport {
    fn update(&self, report: &ExecutionReport) {
        for warning in &report.warnings {
            eprintln!("warning: {warning}");
        }
        for (key, value) in &report.summary {
            eprintln!("{key}: {value}");
        }
    }
}
