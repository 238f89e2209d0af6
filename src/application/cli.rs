#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::application::ui;
use crate::application::ui::OutputFormat;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::TransportName;
use crate::domain::services::StateClassifier;
use crate::domain::services::StepProgressEvaluator;
use crate::infrastructure::transports::TransportManager;

/// What `main` should do once arguments are parsed.
#[derive(Debug, PartialEq, Eq)]
pub enum Run {
    Watch,
    Done,
}

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

pub fn log_path() -> path::PathBuf {
    return dirs::cache_dir()
        .unwrap_or_default()
        .join("sessionwatch/debug.log");
}

async fn print_sessions_list() -> Result<()> {
    let transport = TransportManager::get(Config::transport()?)?;
    let sessions = transport.fetch_sessions().await?;

    if sessions.is_empty() {
        println!("There are no sessions available.");
        return Ok(());
    }

    let format = OutputFormat::from_config()?;
    for session in sessions.iter() {
        println!("{}", ui::format_session(session, format, true)?);
    }

    return Ok(());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn arg_state() -> Arg {
    return Arg::new("state")
        .short('s')
        .long("state")
        .help("Raw session state as reported by the backend.")
        .num_args(1)
        .required(true);
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    return Command::new("debug")
        .about("Debug helpers for sessionwatch")
        .hide(true)
        .subcommand(
            Command::new("classify")
                .about("Shows the display text and severity a raw state maps to.")
                .arg(arg_state()),
        )
        .subcommand(
            Command::new("steps")
                .about("Shows the pipeline progress a raw state maps to.")
                .arg(arg_state()),
        )
        .subcommand(Command::new("states").about("List all known raw states and their classification."))
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running sessionwatch with environment variable RUST_LOG=sessionwatch")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );
}

fn subcommand_sessions() -> Command {
    return Command::new("sessions")
        .about("Inspect sessions visible through the configured transport.")
        .arg_required_else_help(true)
        .subcommand(Command::new("list").about("List all sessions with their ids and current state."));
}

fn subcommand_watch() -> Command {
    return Command::new("watch")
        .about("Track a session until it is ready or fails. This is the default command.")
        .arg(
            Arg::new(ConfigKey::SessionId.to_string())
                .short('i')
                .long("id")
                .env("SESSIONWATCH_SESSION_ID")
                .num_args(1)
                .help("ID of the session to track."),
        );
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("sessionwatch")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(false)
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .subcommand(subcommand_sessions())
        .subcommand(subcommand_watch())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("SESSIONWATCH_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::Transport.to_string())
                .short('t')
                .long(ConfigKey::Transport.to_string())
                .env("SESSIONWATCH_TRANSPORT")
                .num_args(1)
                .help(format!("Where session states are read from. [default: {}]", Config::default(ConfigKey::Transport)))
                .value_parser(PossibleValuesParser::new(TransportName::VARIANTS))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::ApiUrl.to_string())
                .long(ConfigKey::ApiUrl.to_string())
                .env("SESSIONWATCH_API_URL")
                .num_args(1)
                .help(format!("Workspace API URL when using the http transport. [default: {}]", Config::default(ConfigKey::ApiUrl)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::ApiToken.to_string())
                .long(ConfigKey::ApiToken.to_string())
                .env("SESSIONWATCH_API_TOKEN")
                .num_args(1)
                .help("Bearer token sent to the workspace API when using the http transport.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::SessionsFile.to_string())
                .long(ConfigKey::SessionsFile.to_string())
                .env("SESSIONWATCH_SESSIONS_FILE")
                .num_args(1)
                .help("Path to a JSON list of sessions when using the file transport.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::Output.to_string())
                .short('o')
                .long(ConfigKey::Output.to_string())
                .env("SESSIONWATCH_OUTPUT")
                .num_args(1)
                .help(format!("How session updates are printed. [default: {}]", Config::default(ConfigKey::Output)))
                .value_parser(PossibleValuesParser::new(OutputFormat::VARIANTS))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::PollInterval.to_string())
                .long(ConfigKey::PollInterval.to_string())
                .env("SESSIONWATCH_POLL_INTERVAL")
                .num_args(1)
                .help(format!("Time in milliseconds between two session state requests. [default: {}]", Config::default(ConfigKey::PollInterval)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::RequestTimeout.to_string())
                .long(ConfigKey::RequestTimeout.to_string())
                .env("SESSIONWATCH_REQUEST_TIMEOUT")
                .num_args(1)
                .help(format!("Time in milliseconds to wait for a single session state request before giving up. [default: {}]", Config::default(ConfigKey::RequestTimeout)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::PipelineSteps.to_string())
                .long(ConfigKey::PipelineSteps.to_string())
                .env("SESSIONWATCH_PIPELINE_STEPS")
                .num_args(1)
                .help(format!("Comma separated, ordered list of provisioning steps. [default: {}]", Config::default(ConfigKey::PipelineSteps)))
                .global(true),
        );
}

async fn run_debug(matches: &ArgMatches, debug_matches: &ArgMatches) -> Result<()> {
    match debug_matches.subcommand() {
        Some(("classify", classify_matches)) => {
            Config::load(build(), vec![matches, debug_matches, classify_matches]).await?;
            if let Some(state) = classify_matches.get_one::<String>("state") {
                let classification = StateClassifier::classify_in(state, &Config::pipeline_steps()?);
                println!(
                    "{} ({})",
                    classification.display_text, classification.severity
                );
            }
        }
        Some(("steps", steps_matches)) => {
            Config::load(build(), vec![matches, debug_matches, steps_matches]).await?;
            if let Some(state) = steps_matches.get_one::<String>("state") {
                let progress = StepProgressEvaluator::evaluate(state, &Config::pipeline_steps()?);
                println!("{}", ui::format_steps(&progress.steps, true));
            }
        }
        Some(("states", _)) => {
            let res = StateClassifier::known_states()
                .iter()
                .map(|(raw, classification)| {
                    return format!(
                        "{raw}: {} ({})",
                        classification.display_text, classification.severity
                    );
                })
                .collect::<Vec<String>>()
                .join("\n");
            println!("{}", res);
        }
        Some(("log-path", _)) => {
            println!("{}", log_path().to_string_lossy());
        }
        Some(("enum-config", _)) => {
            let res = ConfigKey::VARIANTS.join("\n");
            println!("{}", res);
        }
        _ => {
            subcommand_debug().print_long_help()?;
        }
    }

    return Ok(());
}

pub async fn parse() -> Result<Run> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => {
            run_debug(&matches, debug_matches).await?;
            return Ok(Run::Done);
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
            return Ok(Run::Done);
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(Run::Done);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(Run::Done);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(Run::Done);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(Run::Done);
            }
        },
        Some(("sessions", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("list", list_matches)) => {
                Config::load(build(), vec![&matches, subcmd_matches, list_matches]).await?;
                print_sessions_list().await?;
                return Ok(Run::Done);
            }
            _ => {
                subcommand_sessions().print_long_help()?;
                return Ok(Run::Done);
            }
        },
        Some(("watch", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
        }
        _ => {
            Config::load(build(), vec![&matches]).await?;
        }
    }

    return Ok(Run::Watch);
}
