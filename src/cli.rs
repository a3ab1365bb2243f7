use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

use crate::runner::DEFAULT_SETTING;

const USAGE: &str = "usage: safeguard [--config <path>] [--setting <name>]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub setting: String,
}

pub fn args_from_env() -> Result<CliArgs> {
    parse_args(env::args().skip(1))
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut setting = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --config. {USAGE}"))?;
                config_path = Some(PathBuf::from(value));
            }
            "--setting" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --setting. {USAGE}"))?;
                setting = Some(value);
            }
            other => return Err(anyhow!("unknown argument: {other}. {USAGE}")),
        }
    }

    Ok(CliArgs {
        config_path: config_path.unwrap_or_else(|| PathBuf::from("./safeguard.jsonc")),
        setting: setting.unwrap_or_else(|| DEFAULT_SETTING.to_string()),
    })
}
