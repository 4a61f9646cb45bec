use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the menu scripts (`NN_name` files).
    pub cfg_dir: String,

    /// Prefix prepended to `cfg_dir` when operating on another root,
    /// e.g. a mounted system. Empty for the running system.
    pub cfg_dir_prefix: String,

    /// Command producing the merged boot menu from the cfg dir scripts.
    pub mkconfig_cmd: String,

    /// Command installing the generated menu (runs after save).
    pub update_cmd: String,

    /// Where the generated menu file ends up, for display purposes.
    pub output_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cfg_dir: "/etc/grub.d".to_string(),
            cfg_dir_prefix: String::new(),
            mkconfig_cmd: "grub-mkconfig".to_string(),
            update_cmd: "update-grub".to_string(),
            output_file: "/boot/grub/grub.cfg".to_string(),
        }
    }
}

impl Config {
    /// The cfg dir with the prefix applied, as used for all file access.
    pub fn cfg_dir_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.cfg_dir_prefix, self.expanded_cfg_dir()))
    }

    /// The cfg dir as the target system sees it (no prefix), as written
    /// into generated shell fragments.
    pub fn cfg_dir_noprefix(&self) -> String {
        self.expanded_cfg_dir()
    }

    pub fn proxified_dir_path(&self) -> PathBuf {
        self.cfg_dir_path().join("proxifiedScripts")
    }

    fn expanded_cfg_dir(&self) -> String {
        shellexpand::tilde(&self.cfg_dir).into_owned()
    }
}

pub fn load_config() -> Result<Config> {
    let defaults = Config::default();
    let mut builder = config::Config::builder()
        .set_default("cfg_dir", defaults.cfg_dir)?
        .set_default("cfg_dir_prefix", defaults.cfg_dir_prefix)?
        .set_default("mkconfig_cmd", defaults.mkconfig_cmd)?
        .set_default("update_cmd", defaults.update_cmd)?
        .set_default("output_file", defaults.output_file)?;

    // Load from config files in priority order
    let config_paths = ["menumeld.toml", ".menumeld.toml"];

    for path in &config_paths {
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    // Add environment variables with MENUMELD_ prefix
    builder = builder.add_source(config::Environment::with_prefix("MENUMELD").separator("_"));

    let cfg = builder.build().context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(args: InitArgs, ctx: &AppContext) -> Result<()> {
    let config_path = args.path.join("menumeld.toml");

    if config_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_applies_to_file_access_only() {
        let cfg = Config {
            cfg_dir: "/etc/grub.d".to_string(),
            cfg_dir_prefix: "/mnt/sysroot".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.cfg_dir_path(), PathBuf::from("/mnt/sysroot/etc/grub.d"));
        assert_eq!(cfg.cfg_dir_noprefix(), "/etc/grub.d");
        assert_eq!(
            cfg.proxified_dir_path(),
            PathBuf::from("/mnt/sysroot/etc/grub.d/proxifiedScripts")
        );
    }
}
