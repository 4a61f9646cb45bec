//! The plain case: swap with the next visible sibling in the same list.

use crate::core::error::{Error, Result};
use crate::core::menu::Menu;
use crate::core::mover::{Direction, MoveOutcome, MoveStrategy};
use crate::core::rule::RuleId;

pub struct WithinList;

impl MoveStrategy for WithinList {
    fn name(&self) -> &'static str {
        "within-list"
    }

    fn apply(&self, menu: &mut Menu, rule: RuleId, direction: Direction) -> Result<MoveOutcome> {
        let Some(pid) = menu.proxies.proxy_by_rule(rule) else {
            return Ok(MoveOutcome::NotApplicable);
        };
        let proxy = menu
            .proxies
            .proxy_mut(pid)
            .ok_or(Error::NotFound("proxy".into()))?;
        let Some(next) = proxy.next_visible_in_list(rule, direction.sign()) else {
            return Ok(MoveOutcome::NotApplicable);
        };

        let parent = proxy
            .parent_of(rule)
            .ok_or(Error::NotFound("rule to move".into()))?;
        let moved = proxy
            .detach_rule(rule)
            .ok_or(Error::NotFound("rule to move".into()))?;
        let list = proxy
            .list_mut(parent)
            .ok_or(Error::NotFound("rule list".into()))?;
        let pos = list
            .iter()
            .position(|r| r.id == next)
            .ok_or(Error::NotFound("swap sibling".into()))?;
        let insert_at = match direction {
            Direction::Down => pos + 1,
            Direction::Up => pos,
        };
        list.insert(insert_at, moved);
        Ok(MoveOutcome::Applied)
    }
}
