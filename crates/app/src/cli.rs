//! Command-line flags layered over the TOML config.

use std::path::PathBuf;

use clap::Parser;

use showcase_core::Config;

#[derive(Debug, Parser)]
#[command(name = "showcase", version, about = "Runs one Vulkan technique demo")]
pub struct Cli {
    /// Config file; defaults are used when it does not exist.
    #[arg(long, value_name = "PATH", default_value = "showcase.toml")]
    pub config: PathBuf,

    /// Technique to run, e.g. `multi-viewport`.
    #[arg(long)]
    pub technique: Option<String>,

    /// Seed for procedurally generated content.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Render without a window. FRAMES defaults to `run.headless_frames`.
    #[arg(long, value_name = "FRAMES")]
    pub headless: Option<Option<u32>>,

    /// Disable the Vulkan validation layer.
    #[arg(long)]
    pub no_validation: bool,

    /// Print the available techniques and exit.
    #[arg(long)]
    pub list: bool,
}

impl Cli {
    /// Overrides config values with the flags that were given.
    pub fn apply(&self, config: &mut Config) {
        if let Some(technique) = &self.technique {
            config.run.technique = technique.clone();
        }
        if let Some(seed) = self.seed {
            config.run.seed = seed;
        }
        if self.no_validation {
            config.run.validation = false;
        }
    }

    /// Frame count of a headless run, `None` for a windowed one.
    pub fn headless_frames(&self, config: &Config) -> Option<u32> {
        self.headless
            .map(|frames| frames.unwrap_or(config.run.headless_frames))
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "showcase",
            "--technique",
            "barycentric",
            "--seed",
            "9",
            "--no-validation",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.run.technique, "barycentric");
        assert_eq!(config.run.seed, 9);
        assert!(!config.run.validation);
        assert_eq!(cli.headless_frames(&config), None);
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let cli = Cli::try_parse_from(["showcase"]).unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config, Config::default());
        assert_eq!(cli.config, PathBuf::from("showcase.toml"));
    }

    #[test]
    fn test_headless_frame_count() {
        let config = Config::default();

        let bare = Cli::try_parse_from(["showcase", "--headless"]).unwrap();
        assert_eq!(bare.headless_frames(&config), Some(config.run.headless_frames));

        let counted = Cli::try_parse_from(["showcase", "--headless", "5"]).unwrap();
        assert_eq!(counted.headless_frames(&config), Some(5));
    }
}
