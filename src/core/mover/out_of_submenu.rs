//! Leaving a submenu: the rule is at the submenu's edge in the move
//! direction and steps out next to it. A submenu drained empty vanishes.

use crate::core::error::{Error, Result};
use crate::core::menu::Menu;
use crate::core::mover::{edge_position, Direction, MoveOutcome, MoveStrategy};
use crate::core::rule::RuleId;

pub struct OutOfSubmenu;

impl MoveStrategy for OutOfSubmenu {
    fn name(&self) -> &'static str {
        "out-of-submenu"
    }

    fn apply(&self, menu: &mut Menu, rule: RuleId, direction: Direction) -> Result<MoveOutcome> {
        let Some((pid, Some(submenu))) = edge_position(menu, rule, direction) else {
            return Ok(MoveOutcome::NotApplicable);
        };

        let proxy = menu
            .proxies
            .proxy_mut(pid)
            .ok_or(Error::NotFound("proxy".into()))?;
        let moved = proxy
            .detach_rule(rule)
            .ok_or(Error::NotFound("rule to move".into()))?;

        let grandparent = proxy
            .parent_of(submenu)
            .ok_or(Error::NotFound("submenu".into()))?;
        let submenu_empty = proxy
            .rule(submenu)
            .map(|r| r.children.is_empty())
            .unwrap_or(false);
        let list = proxy
            .list_mut(grandparent)
            .ok_or(Error::NotFound("outer list".into()))?;
        let pos = list
            .iter()
            .position(|r| r.id == submenu)
            .ok_or(Error::NotFound("submenu position".into()))?;
        let insert_at = match direction {
            Direction::Down => pos + 1,
            Direction::Up => pos,
        };
        list.insert(insert_at, moved);
        if submenu_empty {
            proxy.remove_rule(submenu);
        }
        Ok(MoveOutcome::Applied)
    }
}
