use crate::CLAP_STYLING;
use clap::{arg, command};
use relink_core::config::DEFAULT_CONFIG_PATH;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("relink")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("relink")
        .about("Keeps rclone remotes pointed at a mirror's current category links")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress the spinner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("Path to the relink configuration file")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            arg!(--"log-level" <LEVEL>)
                .required(false)
                .global(true)
                .help("Log level (overrides RELINK_LOG)")
                .value_parser(["error", "warn", "info", "debug", "trace"]),
        )
        .subcommand_required(true)
        .subcommand(
            command!("init")
                .about("Writes a starter configuration and creates the record database")
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing configuration file")
                        .required(false),
                ),
        )
        .subcommand(
            command!("run")
                .about(
                    "Polls the mirror, records new or moved links, patches rclone.conf and \
                sends notifications",
                )
                .arg(
                    arg!(--"dry-run")
                        .required(false)
                        .help("Compute and report changes without writing or sending anything")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(command!("check").about("Probes the candidate sources and reports the first one that answers"))
        .subcommand(
            command!("records")
                .about("Lists stored link records and recent runs")
                .arg(
                    arg!(-n --"limit" <NUM_RUNS>)
                        .required(false)
                        .help("Number of recent runs to show")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
}
