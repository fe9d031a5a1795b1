//! Command-line interface.
//!
//! ```text
//! deckfill render  --deck deck.yaml --context data.json [--config engine.yaml] [--output out.json]
//! deckfill compose --layouts a.yaml --layouts b.yaml --slides slides.yaml --context data.json
//! ```
//!
//! Output is written only when rendering recorded no errors. Otherwise
//! every error is printed to stderr and the process exits with status 1.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use deckfill_render::{EngineConfig, LayoutDiscovery, PermissionCheck, RenderErrors};

use crate::compose::compose;
use crate::deck::{deny_types, load_context, load_document, Deck};

/// Fill presentation decks from a data context.
#[derive(Debug, Parser)]
#[command(name = "deckfill", version, about)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render placeholders and loops of an existing deck
    Render(RenderArgs),
    /// Build a new deck from layouts and slide specifications
    Compose(ComposeArgs),
}

/// Options shared by every command.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Context file (JSON or YAML mapping)
    #[arg(long)]
    pub context: PathBuf,

    /// Engine configuration file (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the resulting deck here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Deny values of this type (object type name or map `__type` key)
    #[arg(long = "deny-type", value_name = "TYPE")]
    pub deny_types: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Deck to render
    #[arg(long)]
    pub deck: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct ComposeArgs {
    /// Template decks providing layouts, in priority order (later wins)
    #[arg(long, required = true)]
    pub layouts: Vec<PathBuf>,

    /// Slide specifications (list of mappings)
    #[arg(long)]
    pub slides: PathBuf,

    /// Also use pages tagged `% layout NAME %` as layouts
    #[arg(long)]
    pub tagged: bool,

    /// Also use every page as a layout named by its first text
    #[arg(long)]
    pub by_title: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Runs a command, returning the rendered deck or every rendering error.
///
/// Input problems (unreadable files, invalid documents) are reported as
/// `Err`; rendering problems as the inner `Err`.
pub fn execute(command: &Command) -> anyhow::Result<Result<Deck, RenderErrors>> {
    let common = match command {
        Command::Render(args) => &args.common,
        Command::Compose(args) => &args.common,
    };

    let ctx = load_context(&common.context)?;
    let config = match &common.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let deny = (!common.deny_types.is_empty()).then(|| deny_types(common.deny_types.clone()));
    let predicate = deny.as_ref().map(|f| f as &PermissionCheck);

    let result = match command {
        Command::Render(args) => {
            let deck = Deck::load(&args.deck)?;
            tracing::info!(pages = deck.pages.len(), deck = %args.deck.display(), "rendering");
            deck.render(&ctx, predicate, &config)
        }
        Command::Compose(args) => {
            let templates = args
                .layouts
                .iter()
                .map(|path| Deck::load(path))
                .collect::<Result<Vec<_>, _>>()?;
            let specs: Vec<serde_json::Value> = load_document(&args.slides)?;
            let discovery = LayoutDiscovery {
                tagged: args.tagged,
                titled: args.by_title,
            };
            tracing::info!(slides = specs.len(), templates = templates.len(), "composing");
            compose(&templates, &specs, &ctx, predicate, &config, discovery)
        }
    };
    Ok(result)
}

/// Runs the CLI, writing the deck as JSON or reporting errors.
pub fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let output = match &cli.command {
        Command::Render(args) => args.common.output.as_deref(),
        Command::Compose(args) => args.common.output.as_deref(),
    };

    match execute(&cli.command)? {
        Ok(deck) => {
            write_deck(&deck, output)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(errors) => {
            eprint!("{}", errors);
            Ok(ExitCode::from(1))
        }
    }
}

fn write_deck(deck: &Deck, output: Option<&Path>) -> anyhow::Result<()> {
    let json = deck.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), pages = deck.pages.len(), "wrote deck");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}
