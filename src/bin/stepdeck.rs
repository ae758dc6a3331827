use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use stepdeck::{
    BlockRegistry, NavigationPolicy, SessionHooks, SessionOpts, SlideDocument, SlideSession,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stepdeck", version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a slide document and print authoring warnings.
    Validate(ValidateArgs),
    /// Print the resolved and rendered slots of one step as JSON.
    Resolve(ResolveArgs),
    /// Replay an interaction script and print the resulting state snapshot.
    Replay(ReplayArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input slide document JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Block types the host registers; unknown types are reported. Repeatable.
    #[arg(long = "block-type")]
    block_types: Vec<String>,

    /// Exit with an error if there are authoring warnings.
    #[arg(long, default_value_t = false)]
    deny_warnings: bool,
}

#[derive(Parser, Debug)]
struct ResolveArgs {
    /// Input slide document JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Step index (0-based).
    #[arg(long, default_value_t = 0)]
    step: usize,
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    /// Input slide document JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Replay script JSON (array of operations).
    #[arg(long)]
    script: PathBuf,

    /// Allow jumping ahead past incomplete or unvisited steps.
    #[arg(long, default_value_t = false)]
    free_nav: bool,

    /// Write the snapshot here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Resolve(args) => cmd_resolve(args),
        Command::Replay(args) => cmd_replay(args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let doc = SlideDocument::from_path(&args.in_path)?;
    let known: Vec<&str> = args.block_types.iter().map(String::as_str).collect();
    let known = (!known.is_empty()).then_some(known.as_slice());

    let warnings = match stepdeck::check_document(&doc, known) {
        Ok(w) => w,
        Err(errs) => {
            for e in &errs.errors {
                eprintln!("error: {e}");
            }
            anyhow::bail!(
                "'{}' has {} schema error(s)",
                args.in_path.display(),
                errs.errors.len()
            );
        }
    };

    for w in &warnings {
        eprintln!("warning: {w}");
    }
    if args.deny_warnings && !warnings.is_empty() {
        anyhow::bail!(
            "'{}' has {} authoring warning(s)",
            args.in_path.display(),
            warnings.len()
        );
    }

    eprintln!(
        "ok: {} ({} steps, {} warnings)",
        doc.id,
        doc.steps.len(),
        warnings.len()
    );
    Ok(())
}

fn cmd_resolve(args: ResolveArgs) -> anyhow::Result<()> {
    let doc = SlideDocument::load(&args.in_path)?;
    let types: BTreeSet<String> = doc
        .steps
        .iter()
        .flat_map(|s| s.blocks().map(|(_, b)| b.block_type.clone()))
        .collect();
    let registry = BlockRegistry::with_passthrough(types);

    let opts = SessionOpts {
        navigation: NavigationPolicy::Free,
        lint_on_mount: false,
        ..SessionOpts::default()
    };
    let session = SlideSession::mount(doc, registry, opts, SessionHooks::new())?;
    session
        .go_to_step(args.step)
        .with_context(|| format!("select step {}", args.step))?;

    let rendered = session.render_step();
    let json = serde_json::to_string_pretty(&rendered).context("serialize rendered step")?;
    println!("{json}");
    Ok(())
}

fn cmd_replay(args: ReplayArgs) -> anyhow::Result<()> {
    let doc = SlideDocument::load(&args.in_path)?;
    let ops = stepdeck::load_script(&args.script)?;

    let opts = SessionOpts {
        navigation: if args.free_nav {
            NavigationPolicy::Free
        } else {
            NavigationPolicy::Gated
        },
        ..SessionOpts::default()
    };
    let session = SlideSession::mount(doc, BlockRegistry::new(), opts, SessionHooks::new())?;
    let report = session.replay(&ops);
    for r in &report.rejected {
        eprintln!("rejected op #{}: {}", r.index, r.reason);
    }

    let json =
        serde_json::to_string_pretty(&session.snapshot()).context("serialize snapshot")?;
    match args.out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(&out, json)
                .with_context(|| format!("write snapshot '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    eprintln!(
        "applied {} op(s), rejected {}, complete: {}",
        report.applied,
        report.rejected.len(),
        session.is_complete()
    );
    Ok(())
}
