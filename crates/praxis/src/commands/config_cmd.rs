//! Config subcommand handlers.

use praxis_config::{ConfigError, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

/// TOML for the table view, serde for the structured formats.
fn render_config(cfg: &Config, format: OutputFormat) -> Result<String, CliError> {
    let pretty = toml::to_string_pretty(cfg).map_err(ConfigError::from)?;
    output::render_single(
        format,
        cfg,
        |_| pretty.clone(),
        |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
    )
}

pub fn handle(args: ConfigArgs, global: &mut GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            config::apply_defaults(global, &cfg);
            let out = render_config(&cfg, global.output_format())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init { url, name, force } => {
            let path = config::config_path();
            if path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!("{} already exists (use --force to overwrite)", path.display()),
                });
            }

            // Validate before writing anything.
            praxis_config::profile_to_engine_config(&Profile::new(url.clone()))?;

            let mut cfg = Config {
                default_profile: Some(name.clone()),
                ..Config::default()
            };
            cfg.profiles.insert(name, Profile::new(url));
            let written = config::save_config(&cfg)?;
            output::print_status(&format!("Wrote {}", written.display()), global.quiet);
            Ok(())
        }
    }
}
