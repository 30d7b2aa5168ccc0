use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use linkgate::classifier::classify;
use linkgate::diagnostics;
use linkgate::error::Error;
use linkgate::logging;
use linkgate::policy::SecurityPolicy;
use linkgate::processor::LinkProcessor;
use linkgate::resolver;
use linkgate::types::{DIAGRAM_CONTAINER_HINT, LinkResult, ReferenceKind, RequestContext};

/// Exit code for a link that was denied, missing, or unsupported.
const EXIT_DENIED: u8 = 1;

/// Exit code for a runtime error such as a malformed policy.
const EXIT_RUNTIME: u8 = 3;

#[derive(Parser)]
#[command(name = "linkgate", about = "Classify, resolve, and vet links in markdown documents")]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// Policy file to use instead of `.linkgate.toml` in the working directory.
    #[arg(long, global = true)]
    policy: Option<PathBuf>,
    /// Log each pipeline step to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run a link through the full pipeline with the default handlers
    Check {
        /// Directory being browsed, used when no document is given
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Markdown document containing the link
        #[arg(long)]
        from: Option<PathBuf>,
        /// The link target as written in the document
        href: String,
        /// Output as JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// Print the kind a link is classified as
    Classify {
        /// Treat the link as sitting inside a diagram container
        #[arg(long)]
        diagram: bool,
        /// The link target as written in the document
        href: String,
    },
    /// Print the effective security policy
    Policy {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
    /// Print the canonical path a link resolves to
    Resolve {
        /// Markdown document containing the link
        #[arg(long)]
        from: Option<PathBuf>,
        /// The link target as written in the document
        href: String,
    },
}

/// JSON shape of `check --json`.
#[derive(Serialize)]
struct CheckJson<'a> {
    /// The href as given.
    href: &'a str,
    /// Classified kind.
    kind: ReferenceKind,
    /// Pipeline result.
    result: &'a LinkResult,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Check { dir, from, href, json } => {
            cmd_check(cli.policy.as_deref(), &href, from, dir, json)
        },
        Commands::Classify { diagram, href } => {
            cmd_classify(&href, diagram);
            Ok(ExitCode::SUCCESS)
        },
        Commands::Policy { json } => cmd_policy(cli.policy.as_deref(), json),
        Commands::Resolve { from, href } => cmd_resolve(&href, from.as_deref()),
    };

    return match outcome {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_markdown(&diagnostics::render_error(&e));
            ExitCode::from(EXIT_RUNTIME)
        },
    };
}

/// Process one link and print the result.
///
/// # Errors
///
/// Returns errors from policy loading or JSON serialization.
fn cmd_check(
    policy_path: Option<&Path>,
    href: &str,
    from: Option<PathBuf>,
    dir: Option<PathBuf>,
    json: bool,
) -> Result<ExitCode, Error> {
    let policy = load_policy(policy_path)?;
    let processor = LinkProcessor::with_default_handlers(policy);

    let mut ctx = RequestContext::new(href).with_source_component("cli");
    ctx.current_document = from;
    ctx.current_dir = dir;

    let kind = classify(href, &ctx);
    let result = processor.process(&ctx);

    if json {
        let out = CheckJson { href, kind, result: &result };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", diagnostics::render_result(href, kind, &result));
    }

    if result.success {
        return Ok(ExitCode::SUCCESS);
    }
    return Ok(ExitCode::from(EXIT_DENIED));
}

/// Print the kind of one link.
fn cmd_classify(href: &str, diagram: bool) {
    let mut ctx = RequestContext::new(href);
    if diagram {
        ctx = ctx.with_extension(DIAGRAM_CONTAINER_HINT, true);
    }
    println!("{}", classify(href, &ctx));
}

/// Print the policy that `check` would apply.
///
/// # Errors
///
/// Returns errors from policy loading or serialization.
fn cmd_policy(policy_path: Option<&Path>, json: bool) -> Result<ExitCode, Error> {
    let policy = load_policy(policy_path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&policy)?);
    } else {
        print!("{}", toml::to_string_pretty(&policy)?);
    }
    return Ok(ExitCode::SUCCESS);
}

/// Print the canonical path of one link.
///
/// # Errors
///
/// Returns resolution errors for malformed `file://` links or bad escapes.
fn cmd_resolve(href: &str, from: Option<&Path>) -> Result<ExitCode, Error> {
    let ctx = RequestContext::new(href);
    let path = if classify(href, &ctx) == ReferenceKind::FileProtocol {
        resolver::resolve_file_reference(href)?
    } else {
        resolver::resolve_relative(from, href)?
    };
    println!("{}", path.display());
    return Ok(ExitCode::SUCCESS);
}

/// The explicit policy file, or `.linkgate.toml` from the working directory.
///
/// # Errors
///
/// Returns `Error::ConfigNotFound` for a missing explicit file, or parse errors.
fn load_policy(path: Option<&Path>) -> Result<SecurityPolicy, Error> {
    return match path {
        Some(path) => SecurityPolicy::load_file(path),
        None => SecurityPolicy::load(Path::new(".")),
    };
}
