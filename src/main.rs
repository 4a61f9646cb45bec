use anyhow::Result;
use clap::Parser;
use menumeld::cli::{AppContext, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };
    match cli.command {
        Commands::Show(args) => menumeld::core::show_run(args, &ctx),
        Commands::Move(args) => menumeld::core::edit::move_run(args, &ctx),
        Commands::Rename(args) => menumeld::core::edit::rename_run(args, &ctx),
        Commands::SetVisibility(args) => menumeld::core::edit::visibility_run(args, &ctx),
        Commands::Group(args) => menumeld::core::edit::group_run(args, &ctx),
        Commands::Ungroup(args) => menumeld::core::edit::ungroup_run(args, &ctx),
        Commands::Split(args) => menumeld::core::edit::split_run(args, &ctx),
        Commands::Remove(args) => menumeld::core::edit::remove_run(args, &ctx),
        Commands::Restore(args) => menumeld::core::edit::restore_run(args, &ctx),
        Commands::Revert(args) => menumeld::core::revert_run(args, &ctx),
        Commands::Save(args) => menumeld::core::save_run(args, &ctx),
        Commands::Init(args) => menumeld::infra::config::init(args, &ctx),
        Commands::Completions(args) => menumeld::completion::run(args),
    }
}
