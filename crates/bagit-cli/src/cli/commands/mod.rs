pub mod collect;
pub mod create;
pub mod package;
pub mod validate;

use std::path::Path;

use anyhow::Context;
use bagit_core::BagitConfig;

use super::args::{Cli, Command};
use crate::exit_codes;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = load_config(cli.config.as_deref(), cli.profile.as_deref())?;
    match cli.cmd {
        Command::Create(args) => create::run(args, &config),
        Command::Validate(args) => validate::run(args, &config),
        Command::Package(args) => package::run(args),
        Command::Collect(args) => collect::run(args, &config),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::SUCCESS)
        }
    }
}

/// Environment defaults, then the YAML file, then `--profile`.
pub fn load_config(path: Option<&Path>, profile: Option<&str>) -> anyhow::Result<BagitConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            serde_yaml::from_str::<BagitConfig>(&text)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => BagitConfig::from_env(),
    };
    Ok(match profile {
        Some(profile) => config.with_profile_url(profile),
        None => config,
    })
}
