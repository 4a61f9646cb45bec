//! **menumeld** - Keep a curated boot-menu layout stable across config regenerations
//!
//! The boot menu is generated from a directory of shell scripts. menumeld never
//! edits those scripts; it wraps them in small proxy fragments that reorder,
//! rename and hide the entries they emit, and reconnects the saved layout to
//! whatever the scripts produce today.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core model: entries, scripts, proxies and the sync machinery
pub mod core {
    /// Kernel/initrd field extraction from entry sources
    pub mod content;

    /// Menu entries parsed from generated boot configuration
    pub mod entry;
    pub use entry::{Entry, EntryId, EntryKind};

    /// Error type shared across the crate
    pub mod error;
    pub use error::{Error, Result};

    /// Load/save orchestration over repository and proxies
    pub mod menu;
    pub use menu::Menu;

    /// Rule movement strategies (one visual step at a time)
    pub mod mover;
    pub use mover::{Direction, RuleMover};

    /// A script's customized view: rule tree + sync passes
    pub mod proxy;
    pub use proxy::{Proxy, ProxyId};

    /// The ordered collection of proxies forming the menu
    pub mod proxylist;
    pub use proxylist::Proxylist;

    /// Scripts found in the cfg dir and their entry trees
    pub mod repository;
    pub use repository::Repository;

    /// Rules: what a proxy does with an entry
    pub mod rule;
    pub use rule::{Rule, RuleId, RuleKind};

    /// Shelling out to the generator and install commands
    pub mod runner;
    pub use runner::{CommandRunner, SystemRunner};

    /// Scripts as files: headers, identity paths, renames
    pub mod script;
    pub use script::{Script, ScriptId};

    /// Wire format for rules embedded in proxy fragments
    pub mod wire;

    /// Background loading with progress and cancellation
    pub mod worker;
    pub use worker::{LoadStatus, MenuHandle};

    /// Shared command plumbing (load with progress, commit)
    pub mod session;

    /// `show` command: tree view and removed-entry listing
    pub mod show;
    pub use show::run as show_run;

    /// Rule edit commands: move, rename, visibility, grouping, removal
    pub mod edit;

    /// Whole-menu commands: save and revert
    pub mod install;
    pub use install::{revert_run, save_run};
}

/// Infrastructure - configuration, file conventions and persistence
pub mod infra {
    /// Configuration management with TOML support
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Small file helpers: permissions, script forwarders
    pub mod io;

    /// Reading and recognizing proxy fragment files
    pub mod proxy_script;
    pub use proxy_script::ProxyScriptData;

    /// Map from script files back to their original names
    pub mod script_map;
    pub use script_map::ScriptSourceMap;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use self::core::{Direction, Error, Menu, MenuHandle, Result, RuleMover};
pub use infra::{Config, load_config};
