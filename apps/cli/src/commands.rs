//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use mustgather_archive::ExtractProgress;
use mustgather_core::{ProgressReporter, WorkspaceResolver};
use mustgather_shared::{Context, resolve_context_file};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// mustgather — select and manage must-gather workspaces.
#[derive(Parser)]
#[command(
    name = "mustgather",
    version,
    about = "Select must-gather directories or archives as workspaces and manage saved contexts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Context file (defaults to ~/.mustgather/contexts.json).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Select a must-gather directory, archive, or saved context id.
    Use {
        /// Directory, .tar/.tar.gz/.zip archive, or the id of a saved context.
        input: String,

        /// Id to store the context under (random when omitted).
        #[arg(long)]
        id: Option<String>,
    },

    /// Delete saved contexts.
    Delete {
        /// Workspace path or context id.
        #[arg(required_unless_present_any = ["id", "all"])]
        path: Option<String>,

        /// Context id to delete.
        #[arg(long)]
        id: Option<String>,

        /// Delete every saved context.
        #[arg(long, conflicts_with_all = ["path", "id"])]
        all: bool,
    },

    /// Inspect and manage saved contexts.
    Mg {
        #[command(subcommand)]
        action: MgAction,
    },

    /// Show or change the default namespace of the active workspace.
    Project {
        /// Namespace to switch to.
        namespace: Option<String>,
    },
}

/// `mg` subcommands.
#[derive(Subcommand)]
pub(crate) enum MgAction {
    /// Show the active context.
    Get,
    /// List saved contexts.
    List,
    /// Delete a saved context by path or id.
    Delete {
        /// Workspace path or context id.
        key: String,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mustgather=warn",
        1 => "mustgather=info",
        2 => "mustgather=debug",
        _ => "mustgather=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let context_file = resolve_context_file(cli.config.as_deref())?;
    let mut resolver = WorkspaceResolver::open(&context_file);

    match cli.command {
        Command::Use { input, id } => cmd_use(&mut resolver, &input, id.as_deref()),
        Command::Delete { path, id, all } => {
            if all {
                cmd_delete_all(&mut resolver)
            } else {
                let keys: Vec<String> = path.into_iter().chain(id).collect();
                cmd_delete(&mut resolver, &keys)
            }
        }
        Command::Mg { action } => match action {
            MgAction::Get => cmd_mg_get(&resolver),
            MgAction::List => cmd_mg_list(&resolver, &context_file),
            MgAction::Delete { key } => cmd_delete(&mut resolver, &[key]),
        },
        Command::Project { namespace } => cmd_project(&mut resolver, namespace.as_deref()),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_use(resolver: &mut WorkspaceResolver, input: &str, id: Option<&str>) -> Result<()> {
    info!(input, id, "selecting workspace");

    let reporter = CliProgress::new();
    let result = resolver.resolve_for_use(input, id, &reporter);
    reporter.spinner.finish_and_clear();
    let ctx = result?;

    println!("Now using context {} ({})", ctx.id, ctx.path.display());
    println!("Default namespace: {}", ctx.default_namespace);
    Ok(())
}

fn cmd_delete(resolver: &mut WorkspaceResolver, keys: &[String]) -> Result<()> {
    let removed = resolver.delete(keys)?;
    println!("Deleted {removed} context(s) matching '{}'", keys.join("', '"));
    Ok(())
}

fn cmd_delete_all(resolver: &mut WorkspaceResolver) -> Result<()> {
    let removed = resolver.delete_all()?;
    println!("Deleted all {removed} context(s)");
    Ok(())
}

fn cmd_mg_get(resolver: &WorkspaceResolver) -> Result<()> {
    let ws = resolver.resolve_active()?;
    println!("  ID:        {}", ws.id);
    println!("  Path:      {}", ws.root.display());
    println!("  Namespace: {}", ws.namespace);
    Ok(())
}

fn cmd_mg_list(resolver: &WorkspaceResolver, context_file: &Path) -> Result<()> {
    let contexts = resolver.store().contexts();
    if contexts.is_empty() {
        println!("No saved contexts in {}", context_file.display());
        return Ok(());
    }
    print!("{}", render_context_table(contexts));
    Ok(())
}

fn cmd_project(resolver: &mut WorkspaceResolver, namespace: Option<&str>) -> Result<()> {
    match namespace {
        Some(ns) => {
            let ws = resolver.set_project(ns)?;
            println!("Now using project \"{}\" on context {}", ws.namespace, ws.id);
        }
        None => {
            let ws = resolver.resolve_active()?;
            println!("Using project \"{}\" on context {}", ws.namespace, ws.id);
            for ns in ws.list_namespaces()? {
                let marker = if ns == ws.namespace { "*" } else { " " };
                println!("  {marker} {ns}");
            }
        }
    }
    Ok(())
}

/// Fixed-width table: current marker, id, project, path.
fn render_context_table(contexts: &[Context]) -> String {
    let id_width = contexts
        .iter()
        .map(|c| c.id.len())
        .max()
        .unwrap_or(0)
        .max("ID".len());
    let ns_width = contexts
        .iter()
        .map(|c| c.default_namespace.len())
        .max()
        .unwrap_or(0)
        .max("PROJECT".len());

    let mut out = format!(
        "CURRENT  {:<id_width$}  {:<ns_width$}  PATH\n",
        "ID", "PROJECT"
    );
    for ctx in contexts {
        let marker = if ctx.current { "*" } else { "" };
        out.push_str(&format!(
            "{marker:<7}  {:<id_width$}  {:<ns_width$}  {}\n",
            ctx.id,
            ctx.default_namespace,
            ctx.path.display()
        ));
    }
    out
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ExtractProgress for CliProgress {
    fn entry(&self, path: &Path, written: usize) {
        self.spinner
            .set_message(format!("Extracting [{written}] {}", path.display()));
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _context: &Context) {
        self.spinner.finish_and_clear();
    }
}
