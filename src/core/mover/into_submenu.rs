//! Entering a submenu: the neighbouring visible rule is a submenu, so the
//! rule dives into it instead of jumping over it.

use crate::core::error::{Error, Result};
use crate::core::menu::Menu;
use crate::core::mover::{Direction, MoveOutcome, MoveStrategy};
use crate::core::rule::{RuleId, RuleKind};

pub struct IntoSubmenu;

impl MoveStrategy for IntoSubmenu {
    fn name(&self) -> &'static str {
        "into-submenu"
    }

    fn apply(&self, menu: &mut Menu, rule: RuleId, direction: Direction) -> Result<MoveOutcome> {
        let Some(pid) = menu.proxies.proxy_by_rule(rule) else {
            return Ok(MoveOutcome::NotApplicable);
        };
        let proxy = menu
            .proxies
            .proxy(pid)
            .ok_or(Error::NotFound("proxy".into()))?;
        if proxy.rule(rule).map(|r| r.kind) != Some(RuleKind::Normal) {
            return Ok(MoveOutcome::NotApplicable);
        }
        let Some(next) = proxy.next_visible_in_list(rule, direction.sign()) else {
            return Ok(MoveOutcome::NotApplicable);
        };
        if proxy.rule(next).map(|r| r.kind) != Some(RuleKind::Submenu) {
            return Ok(MoveOutcome::NotApplicable);
        }

        let proxy = menu
            .proxies
            .proxy_mut(pid)
            .ok_or(Error::NotFound("proxy".into()))?;
        let moved = proxy
            .detach_rule(rule)
            .ok_or(Error::NotFound("rule to move".into()))?;
        let submenu = proxy
            .rule_mut(next)
            .ok_or(Error::NotFound("submenu".into()))?;
        // entering from above lands first, from below lands last
        match direction {
            Direction::Down => submenu.children.insert(0, moved),
            Direction::Up => submenu.children.push(moved),
        }
        Ok(MoveOutcome::Applied)
    }
}
