mod run;
mod status;

use anyhow::{Result, anyhow};
use console::style;
use std::path::PathBuf;

use crate::core::config::{CliOverrides, RelayConfig};
use crate::core::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Commands")
        .command("run", "Fetch new reports and post them (default)")
        .command("status", "Show the stored sync state")
        .command("reset", "Forget the stored state; the next run is a first run")
        .command("help", "Show this help")
        .print();

    GuideSection::new("Options")
        .command("--config <path>", "TOML config file (default: <data dir>/config.toml)")
        .command("--state-file <path>", "Where the last-seen marker is kept")
        .command("--fetch-limit <n>", "How many recent reports to request (30)")
        .command("--first-run-limit <n>", "Reports posted on the very first run (3)")
        .command("--log-file <path>", "Also append logs to this file")
        .command("--dry-run", "Print messages instead of sending; state is not saved")
        .command("--no-lock", "Skip the overlapping-run lock")
        .command("-v, --verbose", "Debug logging")
        .print();

    GuideSection::new("Environment")
        .command("TELEGRAM_BOT_TOKEN", "Bot token from @BotFather (required for run)")
        .command("TELEGRAM_CHAT_ID", "Target chat: @channel_name or -100xxxxxxxxxx (required for run)")
        .print();

    println!(
        " {} {} [command] [options]\n",
        style("Usage:").bold(),
        style("iceout-relay").green()
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Run,
    Status,
    Reset,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedArgs {
    pub command: Command,
    pub overrides: CliOverrides,
}

/// Parses `args` (including the program name at index 0). Flags may appear
/// before or after the command.
pub(crate) fn parse_args(args: &[String]) -> Result<ParsedArgs> {
    let mut command = None;
    let mut overrides = CliOverrides::default();

    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        let value = || {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| anyhow!("{} expects a value", arg))
        };
        match arg {
            "--config" => {
                overrides.config_path = Some(PathBuf::from(value()?));
                i += 2;
            }
            "--state-file" => {
                overrides.state_file = Some(PathBuf::from(value()?));
                i += 2;
            }
            "--fetch-limit" => {
                overrides.fetch_limit = Some(value()?);
                i += 2;
            }
            "--first-run-limit" => {
                overrides.first_run_limit = Some(value()?);
                i += 2;
            }
            "--log-file" => {
                overrides.log_file = Some(PathBuf::from(value()?));
                i += 2;
            }
            "--dry-run" => {
                overrides.dry_run = true;
                i += 1;
            }
            "--no-lock" => {
                overrides.no_lock = true;
                i += 1;
            }
            "--verbose" | "-v" => {
                overrides.verbose = true;
                i += 1;
            }
            "--help" | "-h" | "help" => {
                command = Some(Command::Help);
                i += 1;
            }
            "run" | "status" | "reset" if command.is_none() => {
                command = Some(match arg {
                    "run" => Command::Run,
                    "status" => Command::Status,
                    _ => Command::Reset,
                });
                i += 1;
            }
            other => return Err(anyhow!("unknown argument '{}'", other)),
        }
    }

    Ok(ParsedArgs {
        command: command.unwrap_or(Command::Run),
        overrides,
    })
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let parsed = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            print_error(&e.to_string());
            print_help();
            return Err(e);
        }
    };

    if parsed.command == Command::Help {
        print_help();
        return Ok(());
    }

    let config = RelayConfig::load(&parsed.overrides)?;

    match parsed.command {
        Command::Run => {
            crate::logging::init(config.log_file.as_deref(), config.verbose)?;
            run::run_cycle(&config).await
        }
        Command::Status => status::show_status(&config).await,
        Command::Reset => status::reset_state(&config).await,
        Command::Help => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        std::iter::once("iceout-relay")
            .chain(parts.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_arguments_means_run() {
        let parsed = parse_args(&argv(&[])).unwrap();
        assert_eq!(parsed.command, Command::Run);
        assert_eq!(parsed.overrides, CliOverrides::default());
    }

    #[test]
    fn flags_are_read_around_the_command() {
        let parsed = parse_args(&argv(&[
            "--state-file",
            "/tmp/state.json",
            "status",
            "--fetch-limit",
            "10",
            "-v",
        ]))
        .unwrap();
        assert_eq!(parsed.command, Command::Status);
        assert_eq!(
            parsed.overrides.state_file,
            Some(PathBuf::from("/tmp/state.json"))
        );
        assert_eq!(parsed.overrides.fetch_limit.as_deref(), Some("10"));
        assert!(parsed.overrides.verbose);
    }

    #[test]
    fn run_flags() {
        let parsed = parse_args(&argv(&["run", "--dry-run", "--no-lock", "--first-run-limit", "1"]))
            .unwrap();
        assert_eq!(parsed.command, Command::Run);
        assert!(parsed.overrides.dry_run);
        assert!(parsed.overrides.no_lock);
        assert_eq!(parsed.overrides.first_run_limit.as_deref(), Some("1"));
    }

    #[test]
    fn help_wins() {
        assert_eq!(parse_args(&argv(&["--help"])).unwrap().command, Command::Help);
        assert_eq!(parse_args(&argv(&["run", "help"])).unwrap().command, Command::Help);
    }

    #[test]
    fn unknown_or_incomplete_arguments_are_rejected() {
        assert!(parse_args(&argv(&["send"])).is_err());
        assert!(parse_args(&argv(&["--state-file"])).is_err());
        assert!(parse_args(&argv(&["run", "status"])).is_err());
    }
}
