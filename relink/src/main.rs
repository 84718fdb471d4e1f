use clap::ArgMatches;
use colored::Colorize;
use commands::command_argument_builder;
use relink::handlers::{handle_check, handle_init, handle_records, handle_run};
use relink::init_logging;
use relink_core::pipeline::RunOptions;
use relink_core::report::ReportFormat;
use std::process::ExitCode;

mod commands;

/// A run that finished but could not persist everything.
const EXIT_PARTIAL: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();

    let Some((name, primary_command)) = chosen_command.subcommand() else {
        unreachable!("clap should ensure we don't get here")
    };

    let quiet = primary_command.get_flag("quiet");
    let log_level = primary_command
        .get_one::<String>("log-level")
        .map(String::as_str);
    if let Err(e) = init_logging(log_level) {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        return ExitCode::FAILURE;
    }

    let config_path = primary_command
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(relink_core::config::DEFAULT_CONFIG_PATH);

    let result = match name {
        "init" => handle_init(config_path, primary_command.get_flag("force"), quiet)
            .map(|()| ExitCode::SUCCESS),
        "run" => {
            let options = RunOptions {
                dry_run: primary_command.get_flag("dry-run"),
            };
            handle_run(config_path, options, report_format(primary_command))
                .await
                .map(|complete| {
                    if complete {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(EXIT_PARTIAL)
                    }
                })
        }
        "check" => handle_check(config_path, quiet)
            .await
            .map(|()| ExitCode::SUCCESS),
        "records" => {
            let limit = *primary_command.get_one::<usize>("limit").unwrap_or(&10);
            handle_records(config_path, limit, report_format(primary_command))
                .map(|()| ExitCode::SUCCESS)
        }
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
