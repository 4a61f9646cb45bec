//! Whole-menu commands: save the current state, or revert to stock order.

use anyhow::Result;

use crate::cli::{AppContext, RevertArgs, SaveArgs};
use crate::core::session;

/// Reloads and writes the menu back. Useful after editing proxy
/// fragments by hand: the files are normalized and renumbered.
pub fn save_run(_args: SaveArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let mut menu = handle.lock()?;
    session::commit(&mut menu, ctx)
}

/// Drops every customization: one accept-all proxy per script, ordered
/// like the stock configuration.
pub fn revert_run(_args: RevertArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let mut menu = handle.lock()?;
    menu.revert();
    session::commit(&mut menu, ctx)
}
