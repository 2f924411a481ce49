use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use gitsync::context::ExecutionContext;
use gitsync::{ui, GitRepo, Sync, SyncOptions};

#[derive(Parser)]
#[command(
    name = "gitsync",
    about = "Sync commits, branches and tags between two git repositories",
    version
)]
struct Cli {
    /// Target repository directory
    target: PathBuf,

    /// Source repository directory (defaults to the current directory)
    #[arg(long, default_value = ".")]
    source: PathBuf,

    /// Subdirectory of the source repository to sync from
    #[arg(long, default_value = ".")]
    source_dir: String,

    /// Subdirectory of the target repository to sync into
    #[arg(long, default_value = ".")]
    target_dir: String,

    /// Branch include glob (repeatable; default keeps all)
    #[arg(long = "include-branch")]
    include_branches: Vec<String>,

    /// Branch exclude glob (repeatable)
    #[arg(long = "exclude-branch")]
    exclude_branches: Vec<String>,

    /// Tag include glob (repeatable; default keeps all)
    #[arg(long = "include-tag")]
    include_tags: Vec<String>,

    /// Tag exclude glob (repeatable)
    #[arg(long = "exclude-tag")]
    exclude_tags: Vec<String>,

    /// Prefix prepended to projected tag names
    #[arg(long, default_value = "")]
    add_tag_prefix: String,

    /// Prefix stripped from source tag names before projection
    #[arg(long, default_value = "")]
    remove_tag_prefix: String,

    /// Skip tag reconciliation
    #[arg(long)]
    no_tags: bool,

    /// Only consider source commits after this unix timestamp
    #[arg(long)]
    after: Option<u64>,

    /// Limit the number of scanned source commits
    #[arg(long)]
    max_count: Option<u32>,

    /// Do not copy author/committer identity onto projected commits
    #[arg(long)]
    no_preserve_commit: bool,

    /// Pathspec filter scoping the sync (repeatable)
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Collapse each source-branch range into a single target commit
    #[arg(long)]
    squash: bool,

    /// Branch squashed first; others are based on its target tip
    #[arg(long, default_value = "master")]
    squash_base_branch: String,

    /// Glob naming branches recreated from scratch each run (repeatable)
    #[arg(long = "develop-branch")]
    develop_branches: Vec<String>,

    /// Skip creating branches even with an existing target branch
    #[arg(long)]
    skip_even_branch: bool,

    /// Plugin executable (repeatable)
    #[arg(long = "plugin")]
    plugins: Vec<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,

    /// Show git commands being executed
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    ExecutionContext::init(cli.verbose);

    if let Err(err) = run(cli) {
        ui::error_stderr(&format!("{:#}", err));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let source_dir = fs::canonicalize(&cli.source)
        .with_context(|| format!("Source directory \"{}\" not found", cli.source.display()))?;
    let target_dir = fs::canonicalize(&cli.target)
        .with_context(|| format!("Target directory \"{}\" not found", cli.target.display()))?;
    let source = GitRepo::open(source_dir);
    let target = GitRepo::open(target_dir);

    if !cli.yes {
        let prompt = format!(
            "Sync \"{}\" into \"{}\"?",
            source.dir.display(),
            target.dir.display()
        );
        if !ui::confirm(&prompt, true)? {
            ui::warning("Cancelled");
            return Ok(());
        }
    }

    let options = SyncOptions {
        source_dir: cli.source_dir,
        target_dir: cli.target_dir,
        include_branches: cli.include_branches,
        exclude_branches: cli.exclude_branches,
        include_tags: cli.include_tags,
        exclude_tags: cli.exclude_tags,
        add_tag_prefix: cli.add_tag_prefix,
        remove_tag_prefix: cli.remove_tag_prefix,
        no_tags: cli.no_tags,
        after: cli.after,
        max_count: cli.max_count,
        preserve_commit: !cli.no_preserve_commit,
        filters: cli.filters,
        squash: cli.squash,
        squash_base_branch: cli.squash_base_branch,
        develop_branches: cli.develop_branches,
        skip_even_branch: cli.skip_even_branch,
        plugins: cli.plugins,
    };

    let mut sync = Sync::new(source, target, options)?;
    match sync.run() {
        Ok(()) => {
            ui::success("Sync completed.");
            Ok(())
        }
        Err(err) => {
            print_recovery(&sync);
            Err(err)
        }
    }
}

/// Print the manual-recovery hint after a failed run.
fn print_recovery(sync: &Sync) {
    println!("Sorry, an error occurred during sync.");
    println!();
    if !ExecutionContext::is_verbose() {
        let argv: Vec<String> = std::env::args().collect();
        println!("To retry your command with verbose logs:");
        println!();
        println!("    {}", ui::cmd_style(format!("{} --verbose", argv.join(" "))));
        println!();
    }
    println!("To reset to previous HEAD:");
    println!();
    println!("    cd {}", sync.target_dir().display());
    match sync.init_hash() {
        Some(hash) => println!("    git reset --hard {}", hash),
        None => {
            println!("    git rm --cached -r *");
            println!("    git update-ref -d HEAD");
        }
    }
}
