//! mdsync - normalize, check and watch markdown through the editing core.
//!
//! # Usage
//!
//! ```bash
//! mdsync README.md
//! mdsync --check docs/guide.md
//! mdsync --write --bullet - --emphasis _ notes.md
//! mdsync --diff HEAD.md README.md
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use mdsync::Session;
use mdsync::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use mdsync::plugin::Plugin;
use mdsync::plugins::{CorePluginParams, DiffSourcePlugin, DiffSourcePluginParams, content_plugins};
use mdsync::session::{ViewMode, has_changes};

/// Normalize markdown through the plugin-driven editing core
#[derive(Parser, Debug)]
#[command(name = "mdsync", version, about, long_about = None)]
struct Cli {
    /// Markdown file to process
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Watch the file and re-import on every change
    #[arg(short, long)]
    watch: bool,

    /// Exit non-zero if the file fails to import or is not normalized
    #[arg(long)]
    check: bool,

    /// Write the normalized markdown back to the file
    #[arg(long)]
    write: bool,

    /// Keep raw HTML as literal text instead of HTML elements
    #[arg(long)]
    no_html: bool,

    /// Preferred line width for the serializer
    #[arg(long, value_name = "COLUMNS")]
    width: Option<usize>,

    /// Bullet marker for unordered lists (-, * or +)
    #[arg(long, value_name = "CHAR")]
    bullet: Option<char>,

    /// Emphasis marker (* or _)
    #[arg(long, value_name = "CHAR")]
    emphasis: Option<char>,

    /// Strong marker (* or _)
    #[arg(long, value_name = "CHAR")]
    strong: Option<char>,

    /// Thematic break marker (-, * or _)
    #[arg(long, value_name = "CHAR")]
    rule: Option<char>,

    /// Code fence marker (` or ~)
    #[arg(long, value_name = "CHAR")]
    fence: Option<char>,

    /// Print a line diff of the normalized file against a reference file
    #[arg(long, value_name = "REF")]
    diff: Option<PathBuf>,

    /// Print the structured document tree as JSON
    #[arg(long)]
    dump_tree: bool,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn effective_flags(raw_args: &[String], cli: &Cli) -> Result<ConfigFlags> {
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    Ok(file_flags.union(&cli_flags))
}

fn build_session(markdown: &str, flags: &ConfigFlags, reference: Option<String>) -> Result<Session> {
    let options = flags.to_markdown_options();
    if let Err(reason) = options.validate() {
        anyhow::bail!("Invalid serializer options: {reason}");
    }
    let params = CorePluginParams {
        suppress_html_processing: flags.no_html,
        to_markdown_options: options,
        ..CorePluginParams::with_markdown(markdown)
    };
    let mut plugins: Vec<Box<dyn Plugin>> = content_plugins();
    if let Some(diff_markdown) = reference {
        plugins.push(Box::new(DiffSourcePlugin::new(DiffSourcePluginParams {
            view_mode: ViewMode::Diff,
            diff_markdown,
        })));
    }
    Session::with_core(params, plugins).context("Failed to build editing session")
}

fn print_diff(session: &Session) -> bool {
    let diff = session.diff_view();
    for line in &diff {
        println!("{}", line.render());
    }
    has_changes(&diff)
}

fn report(session: &Session, cli: &Cli, original: &str) -> Result<ExitCode> {
    if let Some(error) = session.error() {
        eprintln!("{}: {}", cli.file.display(), error.error);
        return Ok(ExitCode::FAILURE);
    }
    let markdown = session.markdown();
    let normalized = markdown.trim() == original.trim();

    if cli.dump_tree {
        if let Some(root) = session.root_editor() {
            let state = root.state();
            println!("{}", serde_json::to_string_pretty(state.root())?);
        }
    } else if cli.diff.is_some() {
        print_diff(session);
    } else if !cli.check && !cli.write {
        println!("{markdown}");
    }

    if cli.write && !normalized {
        write_back(&cli.file, &markdown)?;
    }
    if cli.check && !normalized {
        eprintln!("{}: not normalized", cli.file.display());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn write_back(path: &Path, markdown: &str) -> Result<()> {
    fs::write(path, format!("{markdown}\n"))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(file = %path.display(), bytes = markdown.len(), "normalized file written");
    Ok(())
}

fn watch(session: &Session, cli: &Cli) -> Result<()> {
    mdsync::watcher::watch_document(
        session,
        &cli.file,
        Duration::from_millis(150),
        Duration::from_millis(50),
        |session| {
            match session.error() {
                Some(error) => eprintln!("{}: {}", cli.file.display(), error.error),
                None if cli.diff.is_some() => {
                    print_diff(session);
                }
                None => println!("{}", session.markdown()),
            }
            true
        },
    )
}

fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let effective = effective_flags(&raw_args, &cli)?;

    if !cli.file.exists() {
        anyhow::bail!("File not found: {}", cli.file.display());
    }
    let original = fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;
    let reference = cli
        .diff
        .as_deref()
        .map(|path| {
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
        })
        .transpose()?;

    let session = build_session(&original, &effective, reference)?;
    let code = report(&session, &cli, &original)?;

    if effective.watch {
        watch(&session, &cli)?;
    }
    Ok(code)
}
