#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::collections::HashMap;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;
use tokio::time::Duration;

use crate::domain::models::PipelineSteps;
use crate::domain::models::TransportName;
use crate::domain::models::DEFAULT_PIPELINE_STEPS;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    ApiToken,
    ApiUrl,
    ConfigFile,
    Output,
    PipelineSteps,
    PollInterval,
    RequestTimeout,
    SessionId,
    SessionsFile,
    Transport,
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        let config_path = dirs::config_dir()
            .unwrap_or_default()
            .join("sessionwatch/config.toml");
        let default_transport = TransportName::Http.to_string();
        let default_steps = DEFAULT_PIPELINE_STEPS.join(",");

        let res = match key {
            ConfigKey::ApiToken => "",
            ConfigKey::ApiUrl => "http://localhost:8080",
            ConfigKey::Output => "text",
            ConfigKey::PipelineSteps => default_steps.as_str(),
            ConfigKey::PollInterval => "2000",
            ConfigKey::RequestTimeout => "10000",
            ConfigKey::SessionsFile => "",
            ConfigKey::Transport => default_transport.as_str(),

            // Special
            ConfigKey::ConfigFile => return config_path.to_string_lossy().to_string(),
            ConfigKey::SessionId => "",
        };

        return res.to_string();
    }

    /// Millisecond durations such as `poll-interval`. Zero is rejected.
    pub fn parse_duration(key: ConfigKey, value: &str) -> Result<Duration> {
        let millis = match value.trim().parse::<u64>() {
            Ok(millis) => millis,
            Err(_) => bail!(format!(
                "Invalid value for '{key}': {value}\nExpected a duration in milliseconds"
            )),
        };

        if millis == 0 {
            bail!(format!("Invalid value for '{key}': must be greater than zero"));
        }

        return Ok(Duration::from_millis(millis));
    }

    pub fn duration(key: ConfigKey) -> Result<Duration> {
        return Config::parse_duration(key, &Config::get(key));
    }

    pub fn pipeline_steps() -> Result<PipelineSteps> {
        return PipelineSteps::parse(&Config::get(ConfigKey::PipelineSteps));
    }

    pub fn transport() -> Result<TransportName> {
        let name = Config::get(ConfigKey::Transport);
        if let Some(transport) = TransportName::parse(&name) {
            return Ok(transport);
        }

        bail!(format!("No transport named {name}"));
    }

    fn possible_values(cmd: &Command, key: ConfigKey) -> Vec<String> {
        if let Some(arg) = cmd.get_arguments().find(|e| {
            return e.get_long() == Some(key.to_string().as_str());
        }) {
            return arg
                .get_possible_values()
                .iter()
                .map(|e| return e.get_name().to_string())
                .collect::<Vec<String>>();
        }

        return vec![];
    }

    fn validate(cmd: &Command, values: &HashMap<ConfigKey, String>) -> Result<()> {
        for (key, val) in values.iter() {
            let possible_values = Config::possible_values(cmd, *key);
            if !possible_values.is_empty() && !possible_values.contains(val) {
                bail!(format!(
                    "Invalid value for key '{key}': {val}\nPossible values are: {}",
                    possible_values.join(", ")
                ));
            }

            match key {
                ConfigKey::PollInterval | ConfigKey::RequestTimeout => {
                    Config::parse_duration(*key, val)?;
                }
                ConfigKey::PipelineSteps => {
                    PipelineSteps::parse(val)?;
                }
                _ => {}
            }
        }

        return Ok(());
    }

    /// Merges defaults, the config file and command line flags, in that order
    /// of precedence. Nothing is stored unless every value is valid.
    pub async fn resolve(
        cmd: &Command,
        clap_arg_matches: &[&ArgMatches],
    ) -> Result<HashMap<ConfigKey, String>> {
        let mut values = ConfigKey::iter()
            .map(|key| return (key, Config::default(key)))
            .collect::<HashMap<ConfigKey, String>>();

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }
        values.insert(ConfigKey::ConfigFile, config_file.to_string());

        let config_path = path::PathBuf::from(&config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if key == ConfigKey::ConfigFile {
                    continue;
                }

                if let Some(val) = doc.get(&key.to_string()) {
                    if let Some(val_int) = val.as_integer() {
                        values.insert(key, val_int.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        values.insert(key, val_str.to_string());
                    } else if let Some(val_arr) = val.as_array() {
                        let names = val_arr
                            .iter()
                            .filter_map(|e| return e.as_str())
                            .collect::<Vec<&str>>()
                            .join(",");
                        values.insert(key, names);
                    } else {
                        bail!(format!(
                            "{config_file} has an unsupported value type for key '{key}'"
                        ));
                    }
                }
            }

            if let Err(err) = Config::validate(cmd, &values) {
                bail!(format!("{config_file} is invalid. {err}"));
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    values.insert(key, val.to_string());
                }
            }
        }

        Config::validate(cmd, &values)?;

        return Ok(values);
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        let values = Config::resolve(&cmd, &clap_arg_matches).await?;
        for (key, val) in values.iter() {
            Config::set(*key, val);
        }

        tracing::debug!(
            transport = Config::get(ConfigKey::Transport),
            api_url = Config::get(ConfigKey::ApiUrl),
            sessions_file = Config::get(ConfigKey::SessionsFile),
            poll_interval = Config::get(ConfigKey::PollInterval),
            request_timeout = Config::get(ConfigKey::RequestTimeout),
            pipeline_steps = Config::get(ConfigKey::PipelineSteps),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::SessionId || key == ConfigKey::ConfigFile {
                    return None;
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))?;

                let mut description = arg
                    .get_help()
                    .map(|e| return e.to_string())
                    .unwrap_or_default()
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                let possible_values = Config::possible_values(&cmd, key);
                if !possible_values.is_empty() {
                    description = format!(
                        "{description} [possible values: {}]",
                        possible_values.join(", ")
                    );
                }

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<i64>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
