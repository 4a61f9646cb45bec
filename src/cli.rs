use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "menumeld")]
#[command(about = "Rearrange, rename and hide boot menu entries without touching shell scripts")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show the resulting menu without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display the menu as a tree
    Show(ShowArgs),

    /// Move an entry one step up or down
    Move(MoveArgs),

    /// Rename a menu entry (the boot behavior is untouched)
    Rename(RenameArgs),

    /// Show or hide a menu entry
    SetVisibility(SetVisibilityArgs),

    /// Wrap an entry in a new submenu
    Group(GroupArgs),

    /// Dissolve a submenu, lifting its entries next to it
    Ungroup(UngroupArgs),

    /// Split a submenu in two at the given entry
    Split(SplitArgs),

    /// Remove an entry from the menu and its script
    Remove(RemoveArgs),

    /// Bring back an entry that no proxy shows anymore
    Restore(RestoreArgs),

    /// Throw away all customizations and restore the stock menu order
    Revert(RevertArgs),

    /// Write the current state back and run the install command
    Save(SaveArgs),

    /// Initialize a menumeld.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser)]
pub struct ShowArgs {
    /// Include hidden entries and placeholders
    #[arg(long)]
    pub all: bool,

    /// List entries removed from the menu instead of the tree
    #[arg(long)]
    pub removed: bool,

    /// Append kernel and initrd details to each entry
    #[arg(long)]
    pub detail: bool,

    /// Dump the rule tree as JSON instead of rendering it
    #[arg(long, conflicts_with = "detail")]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Parser)]
pub struct MoveArgs {
    /// Entry to move (display path, submenu levels joined by '>')
    pub entry: String,

    /// Direction of the move
    #[arg(value_enum)]
    pub direction: MoveDirection,

    /// Number of steps to move
    #[arg(long, default_value_t = 1)]
    pub steps: usize,
}

#[derive(Parser)]
pub struct RenameArgs {
    /// Entry to rename (display path)
    pub entry: String,

    /// New display name
    pub name: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Visibility {
    Shown,
    Hidden,
}

#[derive(Parser)]
pub struct SetVisibilityArgs {
    /// Entry to change (display path)
    pub entry: String,

    /// Target state
    #[arg(value_enum)]
    pub state: Visibility,
}

#[derive(Parser)]
pub struct GroupArgs {
    /// Entry to wrap (display path)
    pub entry: String,

    /// Name of the new submenu
    #[arg(long, default_value = "New submenu")]
    pub name: String,
}

#[derive(Parser)]
pub struct UngroupArgs {
    /// Submenu to dissolve (display path)
    pub entry: String,
}

#[derive(Parser)]
pub struct SplitArgs {
    /// Entry opening the second half (display path, must sit in a submenu)
    pub entry: String,
}

#[derive(Parser)]
pub struct RemoveArgs {
    /// Entry to remove (display path)
    pub entry: String,
}

#[derive(Parser)]
pub struct RestoreArgs {
    /// Script the entry belongs to (as listed by `show --removed`)
    pub script: String,

    /// Entry to restore (identity path, submenu levels joined by '>')
    pub entry: String,
}

#[derive(Parser)]
pub struct RevertArgs {}

#[derive(Parser)]
pub struct SaveArgs {}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
