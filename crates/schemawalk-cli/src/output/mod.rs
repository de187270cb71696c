//! Output formatting

use miette::{IntoDiagnostic, Result};
use schemawalk_core::{Diagnostic, Severity};

use crate::args::OutputFormat;

/// Output formatter for diagnostics
pub struct OutputFormatter {
    format: OutputFormat,
    file_name: String,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, file_name: String) -> Self {
        Self { format, file_name }
    }

    /// Print the diagnostics of one file in the configured format
    pub fn print_diagnostics(
        &self,
        diagnostics: &[Diagnostic],
        applied: usize,
        source: &str,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                self.print_human(diagnostics, source);
                Ok(())
            }
            OutputFormat::Json => self.print_json(diagnostics, applied),
            OutputFormat::Sarif => self.print_sarif(diagnostics),
        }
    }

    fn print_human(&self, diagnostics: &[Diagnostic], source: &str) {
        for diag in diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "\x1b[31merror\x1b[0m",
                Severity::Warning => "\x1b[33mwarning\x1b[0m",
                Severity::Info => "\x1b[34minfo\x1b[0m",
            };

            eprintln!("{}[{}]: {}", severity_str, diag.code(), diag.message);

            if let Some(line) = diag.line {
                eprintln!("  --> {}:{}", self.file_name, line);

                if let Some(source_line) = get_source_line(source, line) {
                    eprintln!("   |");
                    eprintln!("{:>3} | {}", line, source_line);
                    let underline = "^".repeat(source_line.trim().chars().count().max(1));
                    let padding = " ".repeat(leading_width(source_line));
                    eprintln!("   | {}{}", padding, underline);
                }
            }

            if let Some(help) = &diag.help {
                eprintln!("   = help: {}", help);
            }

            eprintln!();
        }
    }

    fn print_json(&self, diagnostics: &[Diagnostic], applied: usize) -> Result<()> {
        let output = serde_json::json!({
            "file": self.file_name,
            "applied": applied,
            "diagnostics": diagnostics
        });
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
        Ok(())
    }

    fn print_sarif(&self, diagnostics: &[Diagnostic]) -> Result<()> {
        let results: Vec<serde_json::Value> = diagnostics
            .iter()
            .map(|d| {
                let mut location = serde_json::json!({
                    "artifactLocation": {
                        "uri": self.file_name
                    }
                });
                if let Some(line) = d.line {
                    location["region"] = serde_json::json!({ "startLine": line });
                }
                serde_json::json!({
                    "ruleId": d.code(),
                    "level": match d.severity {
                        Severity::Error => "error",
                        Severity::Warning => "warning",
                        Severity::Info => "note",
                    },
                    "message": {
                        "text": d.message
                    },
                    "locations": [{
                        "physicalLocation": location
                    }]
                })
            })
            .collect();

        let sarif = serde_json::json!({
            "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
            "version": "2.1.0",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": "schemawalk",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                },
                "results": results
            }]
        });

        println!("{}", serde_json::to_string_pretty(&sarif).into_diagnostic()?);
        Ok(())
    }
}

/// Get a specific line from source (1-indexed)
fn get_source_line(source: &str, line: usize) -> Option<&str> {
    source.lines().nth(line.saturating_sub(1))
}

fn leading_width(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}
