//! Crossing into a neighbouring proxy whose facing rule is a submenu: the
//! rule does not pass the submenu, it enters it. A donor proxy left with
//! nothing visible is dropped, and when that puts two proxies of the
//! receiving script side by side they collapse into one.

use crate::core::error::{Error, Result};
use crate::core::menu::Menu;
use crate::core::mover::{
    detach_with_ghost, edge_position, move_rule_to_other_proxy, next_visible_proxy, Direction,
    MoveOutcome, MoveStrategy,
};
use crate::core::proxy::ProxyId;
use crate::core::rule::{RuleId, RuleKind};

pub struct IntoForeignSubmenu;

impl MoveStrategy for IntoForeignSubmenu {
    fn name(&self) -> &'static str {
        "into-foreign-submenu"
    }

    fn apply(&self, menu: &mut Menu, rule: RuleId, direction: Direction) -> Result<MoveOutcome> {
        // toplevel rules only; nested rules never cross proxies directly
        let Some((pid, None)) = edge_position(menu, rule, direction) else {
            return Ok(MoveOutcome::NotApplicable);
        };
        let proxy = menu
            .proxies
            .proxy(pid)
            .ok_or(Error::NotFound("proxy".into()))?;
        if proxy.rule(rule).map(|r| r.kind) != Some(RuleKind::Normal) {
            return Ok(MoveOutcome::NotApplicable);
        }
        let own_script = proxy.source;

        let own_pos = menu
            .proxies
            .position(pid)
            .ok_or(Error::NotFound("proxy position".into()))?;
        let Some(next_pos) = next_visible_proxy(menu, own_pos, direction.sign()) else {
            return Ok(MoveOutcome::NotApplicable);
        };
        let next = &menu.proxies.proxies[next_pos];
        // a same-script neighbour is no foreign territory; the toplevel
        // crossing strategy owns that shape
        if next.source == own_script {
            return Ok(MoveOutcome::NotApplicable);
        }
        let next_pid = next.id;
        let next_script = next.source;
        let Some(facing) = next.edge_visible_toplevel(direction.sign()) else {
            return Ok(MoveOutcome::NotApplicable);
        };
        if next.rule(facing).map(|r| r.kind) != Some(RuleKind::Submenu) {
            return Ok(MoveOutcome::NotApplicable);
        }
        let prev_pid = next_visible_proxy(menu, own_pos, -direction.sign())
            .map(|i| menu.proxies.proxies[i].id);

        let moved = {
            let src = menu
                .proxies
                .proxy_mut(pid)
                .ok_or(Error::NotFound("proxy".into()))?;
            detach_with_ghost(src, rule)?
        };
        let dst = menu
            .proxies
            .proxy_mut(next_pid)
            .ok_or(Error::NotFound("destination proxy".into()))?;
        dst.remove_equivalent(&moved);
        let submenu = dst
            .rule_mut(facing)
            .ok_or(Error::NotFound("facing submenu".into()))?;
        match direction {
            Direction::Down => submenu.children.insert(0, moved),
            Direction::Up => submenu.children.push(moved),
        }

        // the donor may be spent now that its last visible rule left
        let spent = menu
            .proxies
            .proxy(pid)
            .map(|p| p.count_visible_toplevel() == 0)
            .unwrap_or(false);
        if spent {
            menu.proxies.delete_proxy(pid, &menu.repository);
            let prev_same_script = prev_pid
                .and_then(|id| menu.proxies.proxy(id))
                .is_some_and(|p| p.source == next_script);
            if let (Some(prev), true) = (prev_pid, prev_same_script) {
                merge_proxies(menu, prev, next_pid, direction)?;
            }
        }
        Ok(MoveOutcome::Applied)
    }
}

/// Moves every visible toplevel rule of `source` into `dest`, then drops
/// the emptied source proxy. Going down the list is reversed so repeated
/// front-insertion preserves the original order.
fn merge_proxies(
    menu: &mut Menu,
    source: ProxyId,
    dest: ProxyId,
    direction: Direction,
) -> Result<()> {
    let mut visible: Vec<RuleId> = menu
        .proxies
        .proxy(source)
        .ok_or(Error::NotFound("merge source proxy".into()))?
        .rules
        .iter()
        .filter(|r| r.visible)
        .map(|r| r.id)
        .collect();
    if direction == Direction::Down {
        visible.reverse();
    }
    for rule in visible {
        move_rule_to_other_proxy(menu, rule, source, dest, direction)?;
    }
    menu.proxies.delete_proxy(source, &menu.repository);
    Ok(())
}
