use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::{InspectArgs, RealignArgs};
use crate::error::{CliError, Result};
use mctruth::engine::config::{IntegrityPolicy, RealignConfig, RealignConfigBuilder};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Flag overrides shared by the subcommands.
#[derive(Debug, Default)]
struct Overrides<'a> {
    integrity_policy: Option<&'a str>,
    no_label_warnings: bool,
    sequential: bool,
}

pub fn build_config(args: &RealignArgs) -> Result<AppConfig> {
    build(
        &args.input,
        Some(args.output.clone()),
        args.config.as_deref(),
        &args.set_values,
        Overrides {
            integrity_policy: args.integrity_policy.as_deref(),
            no_label_warnings: args.no_label_warnings,
            sequential: args.sequential,
        },
    )
}

pub fn build_inspect_config(args: &InspectArgs) -> Result<AppConfig> {
    build(
        &args.input,
        None,
        args.config.as_deref(),
        &args.set_values,
        Overrides::default(),
    )
}

fn build(
    input_dir: &Path,
    output_path: Option<PathBuf>,
    config_path: Option<&Path>,
    set_values: &[String],
    overrides: Overrides,
) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = match config_path {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let mut file_config = apply_set_values(file_config, set_values)?;
    let realign_file = file_config.realign.take().unwrap_or_default();

    let policy_name = overrides
        .integrity_policy
        .map(str::to_string)
        .or(realign_file.integrity_policy)
        .unwrap_or(defaults.integrity_policy);
    let integrity_policy = IntegrityPolicy::from_str(&policy_name)?;

    let log_label_warnings = if overrides.no_label_warnings {
        false
    } else {
        realign_file
            .log_label_warnings
            .unwrap_or(defaults.log_label_warnings)
    };

    let parallel = !overrides.sequential && realign_file.parallel.unwrap_or(defaults.parallel);

    let realign: RealignConfig = RealignConfigBuilder::new()
        .integrity_policy(integrity_policy)
        .log_label_warnings(log_label_warnings)
        .build()?;

    Ok(AppConfig {
        input_dir: input_dir.to_path_buf(),
        output_path,
        realign,
        parallel,
    })
}

fn parse_bool(key: &str, value_str: &str) -> Result<bool> {
    value_str
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid boolean value for {}: {}", key, value_str)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let realign = config.realign.get_or_insert_with(Default::default);

        match key {
            "realign.integrity-policy" => {
                realign.integrity_policy = Some(value_str.to_string());
            }
            "realign.log-label-warnings" => {
                realign.log_label_warnings = Some(parse_bool(key, value_str)?);
            }
            "realign.parallel" => {
                realign.parallel = Some(parse_bool(key, value_str)?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
