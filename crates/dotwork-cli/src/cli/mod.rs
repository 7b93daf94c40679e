//! CLI argument definitions using the clap derive API.
//!
//! Argument names, aliases, help text and value enums live here. Handlers
//! live in [`crate::commands`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::GlobalArgs;

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "dotwork",
    bin_name = "dotwork",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Provision server instances from file templates",
    long_about = "Dotwork creates server instances by rendering a template directory \
                  with your variables, and keeps existing instances in sync when the \
                  template changes.",
    after_help = "EXAMPLES:\n\
        \x20 dotwork templates list\n\
        \x20 dotwork new minecraft-paper lobby --var port=25566\n\
        \x20 dotwork update ./instances/lobby --dry-run\n\
        \x20 dotwork update-all --dir ./instances\n\
        \x20 dotwork backup restore ./backups/lobby_20250101_120000000.zip",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect the template library.
    #[command(
        subcommand,
        visible_alias = "t",
        about = "List and inspect templates",
        after_help = "EXAMPLES:\n\
            \x20 dotwork templates list\n\
            \x20 dotwork templates list --format json\n\
            \x20 dotwork templates show minecraft-paper\n\
            \x20 dotwork templates inspect minecraft-paper"
    )]
    Templates(TemplatesCommands),

    /// Create a new instance from a template.
    #[command(
        visible_alias = "n",
        about = "Create a new instance",
        after_help = "EXAMPLES:\n\
            \x20 dotwork new minecraft-paper lobby\n\
            \x20 dotwork new minecraft-paper survival --var port=25570 --var motd='Hi'\n\
            \x20 dotwork new proxy edge --output /srv/servers --yes"
    )]
    New(NewArgs),

    /// Find and remove managed instances.
    #[command(
        subcommand,
        visible_alias = "i",
        about = "List and delete instances",
        after_help = "EXAMPLES:\n\
            \x20 dotwork instances list\n\
            \x20 dotwork instances list --dir ./instances --dir /srv/servers\n\
            \x20 dotwork instances delete ./instances/lobby"
    )]
    Instances(InstancesCommands),

    /// Bring one instance in line with its template.
    #[command(
        visible_alias = "u",
        about = "Update an instance from its template",
        after_help = "EXAMPLES:\n\
            \x20 dotwork update ./instances/lobby --dry-run\n\
            \x20 dotwork update ./instances/lobby\n\
            \x20 dotwork update ./instances/lobby --replace --no-backup"
    )]
    Update(UpdateArgs),

    /// Update every managed instance found in the search directories.
    #[command(
        about = "Update all instances",
        after_help = "EXAMPLES:\n\
            \x20 dotwork update-all\n\
            \x20 dotwork update-all --dir ./instances --dir /srv/servers --dry-run"
    )]
    UpdateAll(UpdateAllArgs),

    /// Manage instance backup archives.
    #[command(
        subcommand,
        visible_alias = "b",
        about = "Create, list, restore and delete backups",
        after_help = "EXAMPLES:\n\
            \x20 dotwork backup create ./instances/lobby -d 'before 1.21'\n\
            \x20 dotwork backup list --instance lobby\n\
            \x20 dotwork backup restore ./backups/lobby_20250101_120000000.zip --to ./lobby-old"
    )]
    Backup(BackupCommands),

    /// Manage the Dotwork configuration.
    #[command(
        about = "Configuration management",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 dotwork config init\n\
            \x20 dotwork config get max_backups\n\
            \x20 dotwork config show"
    )]
    Config(ConfigCommands),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 dotwork completions bash > ~/.local/share/bash-completion/completions/dotwork\n\
            \x20 dotwork completions zsh  > ~/.zfunc/_dotwork\n\
            \x20 dotwork completions fish > ~/.config/fish/completions/dotwork.fish"
    )]
    Completions(CompletionsArgs),
}

// ── templates ─────────────────────────────────────────────────────────────────

/// Subcommands for `dotwork templates`.
#[derive(Debug, Subcommand)]
pub enum TemplatesCommands {
    /// List discovered templates.
    #[command(visible_alias = "ls")]
    List {
        #[arg(
            long = "format",
            value_enum,
            default_value = "table",
            help = "Listing format"
        )]
        format: ListFormat,
    },
    /// Show a template's metadata and declared variables.
    Show {
        #[arg(value_name = "NAME", help = "Template name")]
        name: String,
    },
    /// Cross-check declared variables against the placeholders in the files.
    Inspect {
        #[arg(value_name = "NAME", help = "Template name")]
        name: String,
    },
}

/// Output format for `templates list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// Human-readable table.
    Table,
    /// JSON array.
    Json,
}

// ── new ───────────────────────────────────────────────────────────────────────

/// Arguments for `dotwork new`.
#[derive(Debug, Args)]
pub struct NewArgs {
    #[arg(value_name = "TEMPLATE", help = "Template to instantiate")]
    pub template: String,

    /// Instance name; also the directory name under the output directory.
    #[arg(value_name = "NAME", help = "Instance name")]
    pub name: String,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        help = "Parent directory for the instance (default: config default_output_dir)"
    )]
    pub output: Option<PathBuf>,

    /// Variable assignment; repeatable. Values are coerced by the declared type.
    #[arg(
        short = 'V',
        long = "var",
        value_name = "KEY=VALUE",
        value_parser = parse_var,
        help = "Set a template variable (repeatable)"
    )]
    pub vars: Vec<(String, String)>,

    /// Never prompt; missing required variables are an error.
    #[arg(short = 'y', long = "yes", help = "Do not prompt for missing variables")]
    pub yes: bool,
}

/// Split `KEY=VALUE`. The value may itself contain `=`.
fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

// ── instances ─────────────────────────────────────────────────────────────────

/// Subcommands for `dotwork instances`.
#[derive(Debug, Subcommand)]
pub enum InstancesCommands {
    /// List managed instances.
    #[command(visible_alias = "ls")]
    List {
        /// Directories whose immediate subdirectories are scanned.
        #[arg(
            short = 'd',
            long = "dir",
            value_name = "DIR",
            help = "Search directory (repeatable, default: config instances_dir)"
        )]
        dirs: Vec<PathBuf>,
    },
    /// Delete a managed instance directory.
    Delete {
        #[arg(value_name = "PATH", help = "Instance directory")]
        path: PathBuf,

        #[arg(short = 'y', long = "yes", help = "Skip the confirmation prompt")]
        yes: bool,
    },
}

// ── update ────────────────────────────────────────────────────────────────────

/// Arguments for `dotwork update`.
#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(value_name = "PATH", help = "Instance directory")]
    pub path: PathBuf,

    #[command(flatten)]
    pub reconcile: ReconcileArgs,
}

/// Arguments for `dotwork update-all`.
#[derive(Debug, Args)]
pub struct UpdateAllArgs {
    #[arg(
        short = 'd',
        long = "dir",
        value_name = "DIR",
        help = "Search directory (repeatable, default: config instances_dir)"
    )]
    pub dirs: Vec<PathBuf>,

    #[arg(short = 'y', long = "yes", help = "Skip the confirmation prompt")]
    pub yes: bool,

    /// Checked between instances; the instance in progress always finishes.
    #[arg(
        long = "time-limit",
        value_name = "SECONDS",
        help = "Stop starting new instances after this many seconds"
    )]
    pub time_limit: Option<u64>,

    #[command(flatten)]
    pub reconcile: ReconcileArgs,
}

/// Flags shared by `update` and `update-all`.
#[derive(Debug, Clone, Copy, Args)]
pub struct ReconcileArgs {
    /// Report what would change without touching the instance.
    #[arg(long = "dry-run", help = "Show what would change without writing")]
    pub dry_run: bool,

    /// Delete files the template does not provide before recopying.
    #[arg(
        long = "replace",
        help = "Remove instance files that are not in the template (keeps the record)"
    )]
    pub replace: bool,

    #[arg(long = "no-backup", help = "Skip the automatic pre-update backup")]
    pub no_backup: bool,
}

// ── backup ────────────────────────────────────────────────────────────────────

/// Subcommands for `dotwork backup`.
#[derive(Debug, Subcommand)]
pub enum BackupCommands {
    /// Archive an instance directory.
    Create {
        #[arg(value_name = "PATH", help = "Instance directory")]
        path: PathBuf,

        #[arg(
            short = 'd',
            long = "description",
            value_name = "TEXT",
            default_value = "",
            help = "Note stored in the archive manifest"
        )]
        description: String,
    },
    /// List archives, newest first.
    #[command(visible_alias = "ls")]
    List {
        #[arg(
            short = 'i',
            long = "instance",
            value_name = "NAME",
            help = "Only archives of this instance"
        )]
        instance: Option<String>,
    },
    /// Extract an archive into a directory.
    Restore {
        #[arg(value_name = "ARCHIVE", help = "Backup archive")]
        archive: PathBuf,

        #[arg(
            long = "to",
            value_name = "DIR",
            help = "Destination (default: the archived instance's original path)"
        )]
        to: Option<PathBuf>,
    },
    /// Delete an archive.
    Delete {
        #[arg(value_name = "ARCHIVE", help = "Backup archive")]
        archive: PathBuf,
    },
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `dotwork config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a default configuration file.
    Init {
        #[arg(short = 'f', long = "force", help = "Overwrite an existing file")]
        force: bool,
    },
    /// Print the effective configuration.
    Show,
    /// Print the value of one key.
    Get {
        /// Key name, e.g. `max_backups`.
        key: String,
    },
    /// Print the path of the configuration file in use.
    Path,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `dotwork completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_new_with_vars() {
        let cli = Cli::parse_from([
            "dotwork",
            "new",
            "minecraft-paper",
            "lobby",
            "--var",
            "port=25566",
            "-V",
            "motd=a=b",
            "--yes",
        ]);
        let Commands::New(args) = cli.command else {
            panic!("expected New command");
        };
        assert_eq!(args.template, "minecraft-paper");
        assert_eq!(args.name, "lobby");
        assert_eq!(
            args.vars,
            vec![
                ("port".to_string(), "25566".to_string()),
                ("motd".to_string(), "a=b".to_string()),
            ]
        );
        assert!(args.yes);
    }

    #[test]
    fn malformed_var_is_rejected() {
        assert!(Cli::try_parse_from(["dotwork", "new", "t", "n", "--var", "port"]).is_err());
        assert!(Cli::try_parse_from(["dotwork", "new", "t", "n", "--var", "=1"]).is_err());
    }

    #[test]
    fn update_flags() {
        let cli = Cli::parse_from([
            "dotwork",
            "update",
            "./instances/lobby",
            "--dry-run",
            "--replace",
        ]);
        let Commands::Update(args) = cli.command else {
            panic!("expected Update command");
        };
        assert!(args.reconcile.dry_run);
        assert!(args.reconcile.replace);
        assert!(!args.reconcile.no_backup);
    }

    #[test]
    fn update_all_collects_dirs() {
        let cli = Cli::parse_from(["dotwork", "update-all", "-d", "a", "--dir", "b"]);
        let Commands::UpdateAll(args) = cli.command else {
            panic!("expected UpdateAll command");
        };
        assert_eq!(args.dirs, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn templates_list_defaults_to_table() {
        let cli = Cli::parse_from(["dotwork", "templates", "list"]);
        assert!(matches!(
            cli.command,
            Commands::Templates(TemplatesCommands::List {
                format: ListFormat::Table
            })
        ));
    }

    #[test]
    fn backup_description_defaults_to_empty() {
        let cli = Cli::parse_from(["dotwork", "backup", "create", "./lobby"]);
        let Commands::Backup(BackupCommands::Create { description, .. }) = cli.command else {
            panic!("expected backup create");
        };
        assert!(description.is_empty());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::parse_from(["dotwork", "templates", "list", "-vv", "--no-color"]);
        assert_eq!(cli.global.verbose, 2);
        assert!(cli.global.no_color);
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let result = Cli::try_parse_from(["dotwork", "--quiet", "--verbose", "templates", "list"]);
        assert!(result.is_err());
    }
}
