//! schemawalk CLI - walk SQL scripts through a schema snapshot

mod args;
mod config;
mod output;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use schemawalk_core::{
    split_stream, walk_through_sql, DatabaseSnapshot, DatabaseState, Diagnostic, SqlDialect,
};

use crate::args::{Args, Command, OutputFormat};
use crate::config::Config;
use crate::output::OutputFormatter;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let quiet = args.quiet;
    match args.command {
        Command::Check {
            files,
            walk,
            format,
            config: config_path,
        } => {
            let config = Config::load(config_path.as_deref())?.merge_with_args(&files, &walk, format);
            let walk_config = config.walk_through_config()?;
            let snapshot = load_snapshot(config.snapshot.as_deref())?;
            let output_format = config.output_format();

            let sql_files = collect_files(&config.files)?;
            if sql_files.is_empty() {
                miette::bail!("No SQL files specified. Use positional arguments or configure in schemawalk.toml");
            }

            let mut failed = 0;
            for sql_file in &sql_files {
                let content = fs::read_to_string(sql_file).into_diagnostic()?;
                // every file starts from the snapshot
                let mut state = DatabaseState::new(snapshot.as_ref(), &walk_config).into_diagnostic()?;
                let outcome = walk_through_sql(&mut state, &content);
                tracing::debug!(file = %sql_file.display(), applied = outcome.applied, "walked file");

                let diagnostics: Vec<Diagnostic> = outcome.error.iter().map(Diagnostic::from).collect();
                if !diagnostics.is_empty() || output_format != OutputFormat::Human {
                    let formatter = OutputFormatter::new(output_format, sql_file.display().to_string());
                    formatter.print_diagnostics(&diagnostics, outcome.applied, &content)?;
                }
                if !outcome.is_ok() {
                    failed += 1;
                }
            }

            if !quiet {
                if failed > 0 {
                    eprintln!();
                    eprintln!("{} of {} file(s) failed to apply", failed, sql_files.len());
                } else {
                    eprintln!("All {} file(s) applied cleanly", sql_files.len());
                }
            }

            Ok(failed > 0)
        }

        Command::Dump {
            files,
            walk,
            config: config_path,
        } => {
            let config = Config::load(config_path.as_deref())?.merge_with_args(&files, &walk, None);
            let walk_config = config.walk_through_config()?;
            let snapshot = load_snapshot(config.snapshot.as_deref())?;
            let mut state = DatabaseState::new(snapshot.as_ref(), &walk_config).into_diagnostic()?;

            // files build on each other, like a migration series
            for sql_file in collect_files(&config.files)? {
                let content = fs::read_to_string(&sql_file).into_diagnostic()?;
                let outcome = walk_through_sql(&mut state, &content);
                if let Some(err) = &outcome.error {
                    let formatter = OutputFormatter::new(OutputFormat::Human, sql_file.display().to_string());
                    formatter.print_diagnostics(&[Diagnostic::from(err)], outcome.applied, &content)?;
                    return Ok(true);
                }
            }

            println!("{}", state.to_snapshot().to_json().into_diagnostic()?);
            Ok(false)
        }

        Command::Split { file, dialect } => {
            let dialect: SqlDialect = dialect.parse().map_err(|e: String| miette::miette!(e))?;
            let reader = fs::File::open(&file).into_diagnostic()?;

            let result = split_stream(reader, dialect, |statement| {
                if !statement.empty {
                    let first_line = statement.text.trim().lines().next().unwrap_or_default();
                    println!("{}-{}\t{}", statement.start_line(), statement.end_line(), first_line);
                }
                Ok::<(), std::io::Error>(())
            });

            match result {
                Ok(()) => Ok(false),
                Err(err) => {
                    let formatter = OutputFormatter::new(OutputFormat::Human, file.display().to_string());
                    let source = fs::read_to_string(&file).unwrap_or_default();
                    formatter.print_diagnostics(&[Diagnostic::from(&err)], 0, &source)?;
                    Ok(true)
                }
            }
        }
    }
}

fn load_snapshot(path: Option<&str>) -> Result<Option<DatabaseSnapshot>> {
    let Some(path) = path else {
        tracing::warn!("no snapshot given, starting from an empty database");
        return Ok(None);
    };
    let content = fs::read_to_string(Path::new(path)).into_diagnostic()?;
    let snapshot = DatabaseSnapshot::from_json(&content).into_diagnostic()?;
    Ok(Some(snapshot))
}

/// Expand glob patterns; plain paths are kept as given
fn collect_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if pattern.contains('*') {
            let mut matched: Vec<PathBuf> = glob::glob(pattern).into_diagnostic()?.flatten().collect();
            matched.sort();
            files.extend(matched);
        } else {
            files.push(PathBuf::from(pattern));
        }
    }
    Ok(files)
}
