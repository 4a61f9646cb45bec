//! Tree view of the loaded menu, or the list of removed entries.

use anyhow::Result;
use owo_colors::OwoColorize;
use ptree::TreeBuilder;

use crate::cli::{AppContext, ShowArgs};
use crate::core::content::{parse_with, ContentParser, LinuxParser};
use crate::core::menu::Menu;
use crate::core::rule::{Rule, RuleKind};
use crate::core::session;

pub fn run(args: ShowArgs, ctx: &AppContext) -> Result<()> {
    let handle = session::open(ctx)?;
    let menu = handle.lock()?;

    if args.removed {
        print_removed(&menu, ctx);
        return Ok(());
    }
    if args.json {
        print_json(&menu, &args)?;
        return Ok(());
    }
    if !ctx.quiet {
        print_tree(&menu, &args, ctx)?;
    }
    Ok(())
}

/// Machine-readable dump of the toplevel rules. Visibility stays a
/// field on each rule, so only toplevel placeholders are filtered when
/// --all is not set.
fn print_json(menu: &Menu, args: &ShowArgs) -> Result<()> {
    let mut rules: Vec<&Rule> = Vec::new();
    for proxy in &menu.proxies.proxies {
        if !args.all && !proxy.has_visible_rules() {
            continue;
        }
        rules.extend(
            proxy
                .rules
                .iter()
                .filter(|r| args.all || r.kind != RuleKind::Placeholder),
        );
    }
    println!("{}", serde_json::to_string_pretty(&rules)?);
    Ok(())
}

fn print_removed(menu: &Menu, ctx: &AppContext) {
    let removed = menu.removed_entries();
    if removed.is_empty() {
        println!("No removed entries.");
        return;
    }
    for (script, path) in removed {
        let name = menu
            .repository
            .script(script)
            .map(|s| s.name.as_str())
            .unwrap_or("?");
        if ctx.no_color {
            println!("{}  {}", name, path.join(">"));
        } else {
            println!("{}  {}", name.cyan(), path.join(">"));
        }
    }
}

fn print_tree(menu: &Menu, args: &ShowArgs, ctx: &AppContext) -> Result<()> {
    let mut builder = TreeBuilder::new(menu.config.output_file.clone());
    for proxy in &menu.proxies.proxies {
        if !args.all && !proxy.has_visible_rules() {
            continue;
        }
        add_rules(&mut builder, menu, &proxy.rules, args, ctx.no_color);
    }
    ptree::print_tree(&builder.build())?;
    Ok(())
}

fn add_rules(builder: &mut TreeBuilder, menu: &Menu, rules: &[Rule], args: &ShowArgs, no_color: bool) {
    for rule in rules {
        if !args.all && (!rule.visible || rule.kind == RuleKind::Placeholder) {
            continue;
        }
        if rule.kind == RuleKind::Submenu {
            builder.begin_child(rule_label(menu, rule, args, no_color));
            add_rules(builder, menu, &rule.children, args, no_color);
            builder.end_child();
        } else {
            builder.add_empty_child(rule_label(menu, rule, args, no_color));
        }
    }
}

fn rule_label(menu: &Menu, rule: &Rule, args: &ShowArgs, no_color: bool) -> String {
    let mut base = match rule.kind {
        RuleKind::Submenu if no_color => format!("{}/", rule.output_name),
        RuleKind::Submenu => format!("{}/", rule.output_name.blue()),
        RuleKind::Placeholder => format!("*{}", rule.id_path.join("/")),
        RuleKind::Plaintext | RuleKind::Normal => rule.output_name.clone(),
    };
    if args.detail && rule.kind == RuleKind::Normal {
        if let Some(fields) = entry_fields(menu, rule) {
            if no_color {
                base.push_str(&format!("  [{fields}]"));
            } else {
                base.push_str(&format!("  {}", format!("[{fields}]").dimmed()));
            }
        }
    }
    match (rule.visible, no_color) {
        (true, _) => base,
        (false, true) => format!("{} (hidden)", base),
        (false, false) => format!("{} {}", base, "(hidden)".dimmed()),
    }
}

/// Kernel image, initrd and root device of a rule's entry, when its
/// body parses as a known shape.
fn entry_fields(menu: &Menu, rule: &Rule) -> Option<String> {
    let id = rule.data_source?;
    let entry = menu.repository.script_by_entry(id)?.entry(id)?;
    let parsers: [&dyn ContentParser; 1] = [&LinuxParser];
    let fields = parse_with(&parsers, &entry.content)?;

    let mut parts = Vec::new();
    if let Some(kernel) = fields.kernel {
        parts.push(kernel);
    }
    if let Some(initrd) = fields.initrd {
        parts.push(initrd);
    }
    if let Some(root) = fields.root_device {
        parts.push(format!("root={root}"));
    }
    (!parts.is_empty()).then(|| parts.join(" "))
}
