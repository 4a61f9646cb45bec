//! Rule-level edit commands: move, rename, visibility, grouping, removal.
//!
//! Each command loads the full menu, applies a single change to the view
//! model and writes everything back. Entries are addressed by display
//! path with submenu levels joined by `>`.

use anyhow::{Result, anyhow, bail};

use crate::cli::{
    AppContext, GroupArgs, MoveArgs, MoveDirection, RemoveArgs, RenameArgs, RestoreArgs,
    SetVisibilityArgs, SplitArgs, UngroupArgs, Visibility,
};
use crate::core::mover::{Direction, RuleMover};
use crate::core::rule::RuleKind;
use crate::core::session;

pub fn move_run(args: MoveArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let mut menu = handle.lock()?;
    let (_, rule) = session::locate(&menu, &args.entry)?;
    let direction = match args.direction {
        MoveDirection::Up => Direction::Up,
        MoveDirection::Down => Direction::Down,
    };
    let mover = RuleMover::new();
    for _ in 0..args.steps.max(1) {
        mover.move_rule(&mut menu, rule, direction)?;
    }
    session::commit(&mut menu, ctx)
}

pub fn rename_run(args: RenameArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let mut menu = handle.lock()?;
    let (proxy, rule) = session::locate(&menu, &args.entry)?;
    menu.rename_rule(proxy, rule, &args.name)?;
    session::commit(&mut menu, ctx)
}

pub fn visibility_run(args: SetVisibilityArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let mut menu = handle.lock()?;
    let (proxy, rule) = session::locate(&menu, &args.entry)?;
    let visible = matches!(args.state, Visibility::Shown);
    menu.set_rule_visibility(proxy, rule, visible)?;
    session::commit(&mut menu, ctx)
}

/// Creates a named submenu right before the entry and moves the entry
/// into it.
pub fn group_run(args: GroupArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let mut menu = handle.lock()?;
    let (proxy, rule) = session::locate(&menu, &args.entry)?;
    let kind = menu
        .proxies
        .proxy(proxy)
        .and_then(|p| p.rule(rule))
        .map(|r| r.kind);
    if kind != Some(RuleKind::Normal) {
        bail!("only plain menu entries can be grouped");
    }
    let submenu = menu
        .proxies
        .proxy_mut(proxy)
        .ok_or_else(|| anyhow!("entry's proxy vanished"))?
        .create_submenu(rule)?;
    menu.rename_rule(proxy, submenu, &args.name)?;
    RuleMover::new().move_rule(&mut menu, rule, Direction::Up)?;
    session::commit(&mut menu, ctx)
}

/// Replaces a submenu by its children, in place.
pub fn ungroup_run(args: UngroupArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let mut menu = handle.lock()?;
    let (pid, rule) = session::locate(&menu, &args.entry)?;
    let proxy = menu
        .proxies
        .proxy_mut(pid)
        .ok_or_else(|| anyhow!("entry's proxy vanished"))?;
    if proxy.rule(rule).map(|r| r.kind) != Some(RuleKind::Submenu) {
        bail!("'{}' is not a submenu", args.entry);
    }
    let parent = proxy
        .parent_of(rule)
        .ok_or_else(|| anyhow!("submenu not found"))?;
    let children = std::mem::take(
        &mut proxy
            .rule_mut(rule)
            .ok_or_else(|| anyhow!("submenu not found"))?
            .children,
    );
    let list = proxy
        .list_mut(parent)
        .ok_or_else(|| anyhow!("submenu list not found"))?;
    let pos = list
        .iter()
        .position(|r| r.id == rule)
        .ok_or_else(|| anyhow!("submenu position not found"))?;
    list.splice(pos..=pos, children);
    session::commit(&mut menu, ctx)
}

pub fn split_run(args: SplitArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let mut menu = handle.lock()?;
    let (pid, rule) = session::locate(&menu, &args.entry)?;
    menu.proxies
        .proxy_mut(pid)
        .ok_or_else(|| anyhow!("entry's proxy vanished"))?
        .split_submenu(rule)?;
    session::commit(&mut menu, ctx)
}

pub fn remove_run(args: RemoveArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let mut menu = handle.lock()?;
    let (pid, rule) = session::locate(&menu, &args.entry)?;
    let entry = menu
        .proxies
        .proxy(pid)
        .and_then(|p| p.rule(rule))
        .and_then(|r| r.data_source)
        .ok_or_else(|| anyhow!("'{}' is not backed by a script entry", args.entry))?;
    menu.delete_entry(entry)?;
    session::commit(&mut menu, ctx)
}

/// Brings back an entry listed by `show --removed`.
pub fn restore_run(args: RestoreArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let mut menu = handle.lock()?;
    let segments: Vec<String> = args.entry.split('>').map(|s| s.trim().to_string()).collect();
    let entry = menu
        .repository
        .script_by_name(&args.script)
        .ok_or_else(|| anyhow!("no script named '{}'", args.script))?
        .entry_by_path(&segments)
        .ok_or_else(|| anyhow!("script '{}' has no entry '{}'", args.script, args.entry))?
        .id;
    menu.add_entry(entry)?;
    session::commit(&mut menu, ctx)
}
