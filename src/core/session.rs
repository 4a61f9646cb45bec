//! Shared command plumbing: load the menu with a progress bar, resolve
//! entry paths, write the result back.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::cli::AppContext;
use crate::core::menu::Menu;
use crate::core::proxy::ProxyId;
use crate::core::rule::RuleId;
use crate::core::runner::SystemRunner;
use crate::core::worker::MenuHandle;
use crate::infra::config::load_config;

/// Loads the full menu. With a terminal attached this drives a progress
/// bar from the worker thread's status; under --quiet it loads inline.
pub fn open(ctx: &AppContext) -> Result<MenuHandle> {
    let config = load_config()?;
    let menu = Menu::new(config, Box::new(SystemRunner));
    let handle = MenuHandle::new(menu);

    if ctx.quiet {
        handle.load_blocking().context("loading the menu")?;
        return Ok(handle);
    }

    let worker = handle.spawn_load().context("starting the menu load")?;
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {percent:>3}% {msg}")?
            .progress_chars("=> "),
    );
    while !worker.is_finished() {
        let status = handle.status();
        bar.set_position((status.progress() * 100.0) as u64);
        bar.set_message(status.label());
        std::thread::sleep(Duration::from_millis(50));
    }
    bar.finish_and_clear();
    worker
        .join()
        .map_err(|_| anyhow!("menu load thread panicked"))?
        .context("loading the menu")?;
    Ok(handle)
}

/// Resolves a display path (`a>b>c`) to a rule.
pub fn locate(menu: &Menu, path: &str) -> Result<(ProxyId, RuleId)> {
    menu.find_rule(path)
        .ok_or_else(|| anyhow!("no menu entry named '{path}'"))
}

/// Writes the changed menu back, or only announces it under --dry-run.
pub fn commit(menu: &mut Menu, ctx: &AppContext) -> Result<()> {
    if ctx.dry_run {
        if !ctx.quiet {
            println!("{}", "DRY RUN: menu not written".yellow());
        }
        return Ok(());
    }
    menu.save().context("writing the menu")?;
    if !ctx.quiet {
        println!("Menu installed, generated file at {}", menu.config.output_file);
    }
    Ok(())
}
