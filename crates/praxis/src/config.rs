//! CLI configuration -- thin wrapper around `praxis_config` shared types.
//!
//! Adds CLI-specific resolution that respects `GlobalOpts` flag overrides
//! (--url, --profile, --output, --timeout).

use clap::ValueEnum;

use praxis_core::EngineConfig;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use praxis_config::{Config, config_path, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Fill unset global flags from the config file's `[defaults]`.
pub fn apply_defaults(global: &mut GlobalOpts, cfg: &Config) {
    if global.output.is_none() {
        global.output = OutputFormat::from_str(&cfg.defaults.output, true).ok();
    }
    if global.color.is_none() {
        global.color = ColorMode::from_str(&cfg.defaults.color, true).ok();
    }
    if global.timeout.is_none() {
        global.timeout = Some(cfg.defaults.timeout);
    }
}

/// Translate the active profile + global flags into an `EngineConfig`.
///
/// Priority: `--url` flag, then the profile, then the built-in default
/// endpoint. Naming a profile that does not exist is an error.
pub fn build_engine_config(global: &GlobalOpts, cfg: &Config) -> Result<EngineConfig, CliError> {
    let profile_name = cfg.active_profile_name(global.profile.as_deref());

    let mut engine = match cfg.profiles.get(&profile_name) {
        Some(profile) => praxis_config::profile_to_engine_config(profile)?,
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(cfg),
            });
        }
        None => EngineConfig::default(),
    };

    if let Some(ref url) = global.url {
        engine.url = EngineConfig::from_url(url)?.url;
    }

    tracing::debug!(profile = %profile_name, url = %engine.url, "engine configured");
    Ok(engine)
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "(none)".into();
    }
    cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
}
