//! Crossing a proxy boundary at toplevel
//!
//! The hardest move: a toplevel rule at its proxy's edge passes a rule
//! owned by another proxy. Which surgery is needed depends on four facts,
//! combined into a situation code: whether the own proxy shows more than
//! this rule, whether the neighbouring proxy shows more than one rule,
//! whether the proxy after the neighbour belongs to the own script, and
//! whether the proxy behind the own one belongs to the neighbour's
//! script. Every mapped code expands to a task list; an unmapped code is
//! a bug.

use crate::core::error::{Error, Result};
use crate::core::menu::Menu;
use crate::core::mover::{
    detach_with_ghost, edge_position, insert_as_new_proxy, is_own_rule, move_rule_to_other_proxy,
    next_visible_proxy, Direction, MoveOutcome, MoveStrategy,
};
use crate::core::proxy::ProxyId;
use crate::core::rule::RuleId;

/// Ordered by execution: moves before splits before rearranging before
/// deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Task {
    MoveOwnProxy,
    MoveOwnEntry,
    MoveForeignEntry,
    SplitOwnProxy,
    SplitForeignProxy,
    MoveNewProxiesToTheMiddle,
    DeleteOwnProxy,
    DeleteForeignProxy,
}

pub struct OutOfProxy;

impl MoveStrategy for OutOfProxy {
    fn name(&self) -> &'static str {
        "out-of-proxy"
    }

    fn apply(&self, menu: &mut Menu, rule: RuleId, direction: Direction) -> Result<MoveOutcome> {
        let Some((pid, None)) = edge_position(menu, rule, direction) else {
            return Ok(MoveOutcome::NotApplicable);
        };
        let sign = direction.sign();

        // gather the situation before touching anything
        let (own_script, own_pos, next_pid, next_pos, facing, code) = {
            let proxy = menu
                .proxies
                .proxy(pid)
                .ok_or(Error::NotFound("proxy".into()))?;
            if !is_own_rule(menu, proxy, rule) {
                return Ok(MoveOutcome::NotApplicable);
            }
            let own_pos = menu
                .proxies
                .position(pid)
                .ok_or(Error::NotFound("proxy position".into()))?;
            let Some(next_pos) = next_visible_proxy(menu, own_pos, sign) else {
                return Ok(MoveOutcome::NotApplicable);
            };
            let next = &menu.proxies.proxies[next_pos];
            let Some(facing) = next.edge_visible_toplevel(sign) else {
                return Ok(MoveOutcome::NotApplicable);
            };

            let own_multi = proxy.count_visible_toplevel() > 1;
            let next_multi = next.count_visible_toplevel() > 1;
            let mut after_next_own = next_visible_proxy(menu, next_pos, sign)
                .map(|i| menu.proxies.proxies[i].source == proxy.source)
                .unwrap_or(false);
            let mut prev_is_next_script = next_visible_proxy(menu, own_pos, -sign)
                .map(|i| menu.proxies.proxies[i].source == next.source)
                .unwrap_or(false);
            // a multi-rule proxy must be split first; the adjacency bits
            // only matter for single-rule neighbours
            if next_multi {
                after_next_own = false;
            }
            if own_multi {
                prev_is_next_script = false;
            }
            let code = u8::from(own_multi)
                | u8::from(next_multi) << 1
                | u8::from(after_next_own) << 2
                | u8::from(prev_is_next_script) << 3;
            (proxy.source, own_pos, next.id, next_pos, facing, code)
        };

        let mut tasks = match code {
            0b0000 => vec![Task::MoveOwnProxy],
            0b0001 => vec![Task::SplitOwnProxy],
            0b0010 => vec![Task::SplitForeignProxy],
            0b0011 => vec![
                Task::SplitForeignProxy,
                Task::SplitOwnProxy,
                Task::MoveNewProxiesToTheMiddle,
            ],
            0b0100 => vec![Task::MoveOwnEntry, Task::DeleteOwnProxy],
            0b0101 => vec![Task::MoveOwnEntry],
            0b1000 => vec![Task::MoveForeignEntry, Task::DeleteForeignProxy],
            0b1010 => vec![Task::MoveForeignEntry],
            0b1100 => vec![
                Task::MoveOwnEntry,
                Task::MoveForeignEntry,
                Task::DeleteOwnProxy,
                Task::DeleteForeignProxy,
            ],
            other => {
                return Err(Error::Invariant(format!(
                    "unmapped proxy crossing situation {other:04b}"
                )))
            }
        };
        tasks.sort();

        let after_next_pid = next_visible_proxy(menu, next_pos, sign)
            .map(|i| menu.proxies.proxies[i].id);
        let prev_pid = next_visible_proxy(menu, own_pos, -sign)
            .map(|i| menu.proxies.proxies[i].id);
        let next_script = menu
            .proxies
            .proxy(next_pid)
            .map(|p| p.source)
            .ok_or(Error::NotFound("neighbour proxy".into()))?;

        let mut new_own: Option<ProxyId> = None;
        let mut new_foreign: Option<ProxyId> = None;

        for task in tasks {
            match task {
                Task::MoveOwnProxy => {
                    move_proxy(menu, pid, next_pid, direction);
                }
                Task::MoveOwnEntry => {
                    let dest =
                        after_next_pid.ok_or(Error::Invariant("missing landing proxy".into()))?;
                    move_rule_to_other_proxy(menu, rule, pid, dest, direction)?;
                }
                Task::MoveForeignEntry => {
                    let dest =
                        prev_pid.ok_or(Error::Invariant("missing landing proxy".into()))?;
                    move_rule_to_other_proxy(menu, facing, next_pid, dest, direction.opposite())?;
                }
                Task::SplitOwnProxy => {
                    let moved = {
                        let proxy = menu
                            .proxies
                            .proxy_mut(pid)
                            .ok_or(Error::NotFound("proxy".into()))?;
                        detach_with_ghost(proxy, rule)?
                    };
                    let base = menu
                        .proxies
                        .position(next_pid)
                        .ok_or(Error::NotFound("neighbour position".into()))?;
                    let at = match direction {
                        Direction::Down => base + 1,
                        Direction::Up => base,
                    };
                    new_own = Some(insert_as_new_proxy(menu, own_script, at, moved));
                }
                Task::SplitForeignProxy => {
                    let moved = {
                        let next = menu
                            .proxies
                            .proxy_mut(next_pid)
                            .ok_or(Error::NotFound("neighbour proxy".into()))?;
                        detach_with_ghost(next, facing)?
                    };
                    let base = menu
                        .proxies
                        .position(pid)
                        .ok_or(Error::NotFound("proxy position".into()))?;
                    // the carved-off rule lands on the far side of the own
                    // proxy, which thereby gains one position
                    let at = match direction {
                        Direction::Down => base,
                        Direction::Up => base + 1,
                    };
                    new_foreign = Some(insert_as_new_proxy(menu, next_script, at, moved));
                }
                Task::MoveNewProxiesToTheMiddle => {
                    let nf = new_foreign.ok_or(Error::Invariant("split produced no proxy".into()))?;
                    let no = new_own.ok_or(Error::Invariant("split produced no proxy".into()))?;
                    // the old remainders move outward past the split-off
                    // proxies, so only the moved rule and the facing rule
                    // actually trade places
                    move_proxy(menu, next_pid, no, direction);
                    move_proxy(menu, pid, nf, direction.opposite());
                }
                Task::DeleteOwnProxy => {
                    menu.proxies.delete_proxy(pid, &menu.repository);
                }
                Task::DeleteForeignProxy => {
                    menu.proxies.delete_proxy(next_pid, &menu.repository);
                }
            }
        }

        menu.renumerate(true);
        Ok(MoveOutcome::Applied)
    }
}

/// Moves a whole proxy next to `destination`: behind it going down,
/// before it going up. The destination slot is looked up after the
/// removal so the shift cannot skew it.
fn move_proxy(menu: &mut Menu, moving: ProxyId, destination: ProxyId, direction: Direction) {
    let Some(pos) = menu.proxies.position(moving) else {
        return;
    };
    let proxy = menu.proxies.proxies.remove(pos);
    let at = match (menu.proxies.position(destination), direction) {
        (Some(dest), Direction::Down) => dest + 1,
        (Some(dest), Direction::Up) => dest,
        (None, _) => menu.proxies.proxies.len(),
    };
    menu.proxies.proxies.insert(at, proxy);
}
