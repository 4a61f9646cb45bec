//! Moving rules through the menu
//!
//! A move is one visual step up or down. What that means structurally
//! depends on where the rule sits: swapping siblings, entering or leaving
//! a submenu, or crossing a proxy boundary. Each case is a strategy; the
//! mover asks them in a fixed order and the first one that applies wins.
//! A strategy declining is not an error, running out of strategies is.

use tracing::debug;

use crate::core::error::{Error, Result};
use crate::core::menu::Menu;
use crate::core::proxy::{Proxy, ProxyId};
use crate::core::rule::{Rule, RuleId};
use crate::core::script::ScriptId;

mod into_submenu;
mod within_list;
mod foreign_to_toplevel;
mod out_of_submenu;
mod into_foreign_submenu;
mod out_of_proxy;

pub use into_foreign_submenu::IntoForeignSubmenu;
pub use into_submenu::IntoSubmenu;
pub use foreign_to_toplevel::ForeignToToplevel;
pub use out_of_proxy::OutOfProxy;
pub use out_of_submenu::OutOfSubmenu;
pub use within_list::WithinList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn sign(self) -> i32 {
        match self {
            Direction::Down => 1,
            Direction::Up => -1,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
        }
    }
}

/// A strategy either did the move or was not responsible for this shape.
#[derive(Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Applied,
    NotApplicable,
}

pub trait MoveStrategy {
    fn name(&self) -> &'static str;
    fn apply(&self, menu: &mut Menu, rule: RuleId, direction: Direction) -> Result<MoveOutcome>;
}

pub struct RuleMover {
    strategies: Vec<Box<dyn MoveStrategy>>,
}

impl RuleMover {
    pub fn new() -> Self {
        RuleMover {
            strategies: vec![
                Box::new(IntoSubmenu),
                Box::new(WithinList),
                Box::new(ForeignToToplevel),
                Box::new(OutOfSubmenu),
                Box::new(IntoForeignSubmenu),
                Box::new(OutOfProxy),
            ],
        }
    }

    /// Moves `rule` one visual step. `Err(NoMoveTarget)` when the rule is
    /// at the menu boundary.
    pub fn move_rule(&self, menu: &mut Menu, rule: RuleId, direction: Direction) -> Result<()> {
        for strategy in &self.strategies {
            match strategy.apply(menu, rule, direction)? {
                MoveOutcome::Applied => {
                    debug!(strategy = strategy.name(), ?direction, "move applied");
                    return Ok(());
                }
                MoveOutcome::NotApplicable => {}
            }
        }
        Err(Error::NoMoveTarget)
    }
}

impl Default for RuleMover {
    fn default() -> Self {
        RuleMover::new()
    }
}

// ---- shared mechanics ----------------------------------------------------

/// Detaches a rule but leaves a hidden copy in its place, so the next
/// sync does not re-add the entry behind a placeholder at the old spot.
pub(crate) fn detach_with_ghost(proxy: &mut Proxy, rule: RuleId) -> Result<Rule> {
    let parent = proxy
        .parent_of(rule)
        .ok_or(Error::NotFound("rule to move".into()))?;
    let list = proxy
        .list_mut(parent)
        .ok_or(Error::NotFound("rule list".into()))?;
    let pos = list
        .iter()
        .position(|r| r.id == rule)
        .ok_or(Error::NotFound("rule position".into()))?;
    let moved = list.remove(pos);
    let mut ghost = moved.clone_detached();
    ghost.set_visibility(false);
    list.insert(pos, ghost);
    Ok(moved)
}

/// Moves a rule between proxies. The rule enters the destination at the
/// edge it arrives from: front when coming down, back when coming up.
pub(crate) fn move_rule_to_other_proxy(
    menu: &mut Menu,
    rule: RuleId,
    source: ProxyId,
    dest: ProxyId,
    direction: Direction,
) -> Result<()> {
    let src = menu
        .proxies
        .proxy_mut(source)
        .ok_or(Error::NotFound("source proxy".into()))?;
    let moved = detach_with_ghost(src, rule)?;

    let dst = menu
        .proxies
        .proxy_mut(dest)
        .ok_or(Error::NotFound("destination proxy".into()))?;
    dst.remove_equivalent(&moved);
    match direction {
        Direction::Down => dst.rules.insert(0, moved),
        Direction::Up => dst.rules.push(moved),
    }
    Ok(())
}

/// Creates a hidden accept-all proxy for `script` carrying `visible_rule`
/// as its only visible rule, inserted at `position` in the menu.
pub(crate) fn insert_as_new_proxy(
    menu: &mut Menu,
    script: ScriptId,
    position: usize,
    visible_rule: Rule,
) -> ProxyId {
    let mut proxy = Proxy::new(&menu.repository, script, false);
    proxy.remove_equivalent(&visible_rule);
    proxy.rules.insert(0, visible_rule);
    let id = proxy.id;
    menu.proxies.proxies.insert(position.min(menu.proxies.proxies.len()), proxy);
    id
}

/// Index of the nearest proxy with visible rules, walking `step` from
/// `from` (exclusive).
pub(crate) fn next_visible_proxy(menu: &Menu, from: usize, step: i32) -> Option<usize> {
    let len = menu.proxies.proxies.len() as i64;
    let mut i = from as i64;
    loop {
        i += i64::from(step);
        if i < 0 || i >= len {
            return None;
        }
        if menu.proxies.proxies[i as usize].has_visible_rules() {
            return Some(i as usize);
        }
    }
}

/// The proxy holding `rule`, but only when the rule sits at its list's
/// edge in `direction` (no visible sibling to swap with).
pub(crate) fn edge_position(
    menu: &Menu,
    rule: RuleId,
    direction: Direction,
) -> Option<(ProxyId, Option<RuleId>)> {
    let pid = menu.proxies.proxy_by_rule(rule)?;
    let proxy = menu.proxies.proxy(pid)?;
    if proxy.next_visible_in_list(rule, direction.sign()).is_some() {
        return None;
    }
    let parent = proxy.parent_of(rule)?;
    Some((pid, parent))
}

/// Whether the rule's entry belongs to the proxy's own script. Rules
/// without a resolved entry count as own.
pub(crate) fn is_own_rule(menu: &Menu, proxy: &Proxy, rule: RuleId) -> bool {
    let Some(entry) = proxy.rule(rule).and_then(|r| r.data_source) else {
        return true;
    };
    menu.repository
        .script(proxy.source)
        .is_some_and(|s| s.contains(entry))
}
