use std::path::PathBuf;

use cascade_core::config::CascadeConfig;
use cascade_core::error::CascadeError;

pub const DEFAULT_CONFIG_PATH: &str = "cascade.ron";

pub const USAGE: &str = "\
Usage: cascade [OPTIONS]
  --config <path>    Configuration file (default: cascade.ron)
  --state <path>     Voxel state file, overrides the config
  --shaders <dir>    Shader directory, overrides the config
  --regenerate       Generate a fresh world even if the state file exists
  --no-panel         Do not open the settings panel window
  --help             Print this text";

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub config: PathBuf,
    pub state: Option<PathBuf>,
    pub shaders: Option<PathBuf>,
    pub regenerate: bool,
    pub no_panel: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Run(CliArgs),
    Help,
}

impl CliArgs {
    /// Command-line flags win over the config file.
    pub fn apply(&self, config: &mut CascadeConfig) {
        if let Some(state) = &self.state {
            config.state_path = state.clone();
        }
        if let Some(shaders) = &self.shaders {
            config.shader_dir = shaders.clone();
        }
        if self.regenerate {
            config.world.regenerate = true;
        }
        if self.no_panel {
            config.panel = false;
        }
    }
}

/// Parse arguments, excluding the program name.
pub fn parse_args<I>(args: I) -> Result<CliCommand, CascadeError>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs {
        config: PathBuf::from(DEFAULT_CONFIG_PATH),
        state: None,
        shaders: None,
        regenerate: false,
        no_panel: false,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .map(PathBuf::from)
                .ok_or_else(|| CascadeError::Config(format!("{flag} needs a value")))
        };
        match arg.as_str() {
            "--config" => parsed.config = value("--config")?,
            "--state" => parsed.state = Some(value("--state")?),
            "--shaders" => parsed.shaders = Some(value("--shaders")?),
            "--regenerate" => parsed.regenerate = true,
            "--no-panel" => parsed.no_panel = true,
            "--help" | "-h" => return Ok(CliCommand::Help),
            other => return Err(CascadeError::Config(format!("unknown argument: {other}"))),
        }
    }
    Ok(CliCommand::Run(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        match parse_args(args(&[])).expect("no args") {
            CliCommand::Run(a) => {
                assert_eq!(a.config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(a.state.is_none());
                assert!(!a.regenerate);
            }
            CliCommand::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let cmd = parse_args(args(&["--state", "w.ccst", "--shaders", "gpu", "--regenerate"]))
            .expect("valid args");
        let CliCommand::Run(a) = cmd else {
            panic!("unexpected help");
        };
        let mut config = CascadeConfig::default();
        a.apply(&mut config);
        assert_eq!(config.state_path, PathBuf::from("w.ccst"));
        assert_eq!(config.shader_dir, PathBuf::from("gpu"));
        assert!(config.world.regenerate);
        assert!(config.panel);
    }

    #[test]
    fn test_no_panel_disables_panel() {
        let CliCommand::Run(a) = parse_args(args(&["--no-panel"])).expect("valid args") else {
            panic!("unexpected help");
        };
        let mut config = CascadeConfig::default();
        a.apply(&mut config);
        assert!(!config.panel);
    }

    #[test]
    fn test_help_and_errors() {
        assert_eq!(parse_args(args(&["-h"])).expect("help"), CliCommand::Help);
        assert!(matches!(parse_args(args(&["--state"])), Err(CascadeError::Config(_))));
        assert!(matches!(parse_args(args(&["--fast"])), Err(CascadeError::Config(_))));
    }
}
