//! A foreign rule leaving a submenu goes back to toplevel carried by a
//! proxy of its own script, never by the proxy it was visiting. Depending
//! on what surrounds the submenu this reuses a neighbouring proxy of that
//! script, creates a fresh one next door, or splits the holding proxy at
//! the submenu and slots the carrier in between the halves.

use crate::core::error::{Error, Result};
use crate::core::menu::Menu;
use crate::core::mover::{
    detach_with_ghost, edge_position, insert_as_new_proxy, is_own_rule, next_visible_proxy,
    Direction, MoveOutcome, MoveStrategy,
};
use crate::core::proxy::{Proxy, ProxyId};
use crate::core::rule::{Rule, RuleId};
use crate::core::script::ScriptId;

pub struct ForeignToToplevel;

impl MoveStrategy for ForeignToToplevel {
    fn name(&self) -> &'static str {
        "foreign-to-toplevel"
    }

    fn apply(&self, menu: &mut Menu, rule: RuleId, direction: Direction) -> Result<MoveOutcome> {
        let Some((pid, Some(submenu))) = edge_position(menu, rule, direction) else {
            return Ok(MoveOutcome::NotApplicable);
        };
        let proxy = menu
            .proxies
            .proxy(pid)
            .ok_or(Error::NotFound("proxy".into()))?;
        if is_own_rule(menu, proxy, rule) {
            return Ok(MoveOutcome::NotApplicable);
        }
        // only directly nested rules; deeper levels stay inside their
        // submenu
        if proxy.parent_of(submenu) != Some(None) {
            return Ok(MoveOutcome::NotApplicable);
        }
        let Some(entry) = proxy.rule(rule).and_then(|r| r.data_source) else {
            return Ok(MoveOutcome::NotApplicable);
        };
        let Some(home_script) = menu.repository.script_by_entry(entry).map(|s| s.id) else {
            return Ok(MoveOutcome::NotApplicable);
        };

        let sibling = proxy.next_visible_in_list(submenu, direction.sign());
        let own_pos = menu
            .proxies
            .position(pid)
            .ok_or(Error::NotFound("proxy position".into()))?;
        let next = next_visible_proxy(menu, own_pos, direction.sign())
            .map(|i| (menu.proxies.proxies[i].id, menu.proxies.proxies[i].source));

        // the rule never belonged to this proxy's script, so no ghost is
        // left behind
        let moved = {
            let src = menu
                .proxies
                .proxy_mut(pid)
                .ok_or(Error::NotFound("proxy".into()))?;
            src.detach_rule(rule)
                .ok_or(Error::NotFound("rule to move".into()))?
        };

        if sibling.is_some() {
            // the submenu has visible toplevel company in the move
            // direction: divide the proxy there and put the carrier
            // between the halves
            split_and_insert_between(menu, moved, home_script, pid, submenu, direction)?;
        } else if let Some((next_pid, _)) = next.filter(|&(_, source)| source == home_script) {
            // an adjacent proxy of the rule's script takes it directly
            let dst = menu
                .proxies
                .proxy_mut(next_pid)
                .ok_or(Error::NotFound("destination proxy".into()))?;
            dst.remove_equivalent(&moved);
            match direction {
                Direction::Down => dst.rules.insert(0, moved),
                Direction::Up => dst.rules.push(moved),
            }
        } else {
            let at = match direction {
                Direction::Down => own_pos + 1,
                Direction::Up => own_pos,
            };
            insert_as_new_proxy(menu, home_script, at, moved);
        }

        // a drained submenu vanishes
        let drained = menu
            .proxies
            .proxy(pid)
            .and_then(|p| p.rule(submenu))
            .map(|r| r.children.is_empty())
            .unwrap_or(false);
        if drained {
            if let Some(holder) = menu.proxies.proxy_mut(pid) {
                holder.remove_rule(submenu);
            }
        }

        menu.renumerate(true);
        Ok(MoveOutcome::Applied)
    }
}

/// Splits `pid` at the submenu: every toplevel rule on the departure side
/// moves to a new same-script proxy placed next door, then the moved
/// rule's own carrier proxy is inserted directly between the two halves.
fn split_and_insert_between(
    menu: &mut Menu,
    moved: Rule,
    home_script: ScriptId,
    pid: ProxyId,
    submenu: RuleId,
    direction: Direction,
) -> Result<()> {
    let (split_script, half_ids) = {
        let proxy = menu
            .proxies
            .proxy(pid)
            .ok_or(Error::NotFound("proxy to split".into()))?;
        let pos = proxy
            .rules
            .iter()
            .position(|r| r.id == submenu)
            .ok_or(Error::NotFound("submenu position".into()))?;
        let ids: Vec<RuleId> = match direction {
            Direction::Down => proxy.rules[pos + 1..].iter().map(|r| r.id).collect(),
            Direction::Up => proxy.rules[..pos].iter().map(|r| r.id).collect(),
        };
        (proxy.source, ids)
    };

    let mut half = Proxy::new(&menu.repository, split_script, false);
    for id in half_ids {
        let src = menu
            .proxies
            .proxy_mut(pid)
            .ok_or(Error::NotFound("proxy to split".into()))?;
        let rule = detach_with_ghost(src, id)?;
        half.remove_equivalent(&rule);
        half.rules.push(rule);
    }

    let own_pos = menu
        .proxies
        .position(pid)
        .ok_or(Error::NotFound("proxy position".into()))?;
    let at = match direction {
        Direction::Down => own_pos + 1,
        Direction::Up => own_pos,
    };
    menu.proxies.proxies.insert(at, half);
    // the old proxy sits at own_pos going down and at own_pos + 1 going
    // up, so this slot is between the halves either way
    insert_as_new_proxy(menu, home_script, own_pos + 1, moved);
    Ok(())
}
