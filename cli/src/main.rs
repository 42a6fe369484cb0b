use std::{path::PathBuf, time::Duration};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use miette::{Context as _, IntoDiagnostic as _, Result};
use serde_json::Value;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, prelude::*};
use url::Url;
use vitrail::{HtmlTags, Vite};
use vitrail_manifest::TagAttrs;
use vitrail_resolver::{DevServerProbe, FileLoader, ProbeOptions};

#[derive(Parser)]
#[command(name = "vitrail")]
#[command(version)]
#[command(about = "Vitrail CLI")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv, -vvvv).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Resolve(ResolveArgs),
    Probe(ProbeArgs),
}

#[derive(Args)]
struct ResolveArgs {
    /// Path to the Vite-built manifest.json.
    #[arg(short, long, value_name = "PATH")]
    manifest: PathBuf,

    /// Public base URL prepended to every emitted asset URL.
    #[arg(long, value_name = "URL", default_value = "/dist/")]
    base_url: String,

    /// Load stylesheets asynchronously (`media="print"` swap trick).
    #[arg(long)]
    async_css: bool,

    /// Extra attribute for stylesheet tags (`key=value`, repeatable).
    #[arg(long = "css-option", value_name = "KEY=VALUE")]
    css_options: Vec<String>,

    /// Extra attribute for script and preload tags (`key=value`, repeatable).
    #[arg(long = "js-option", value_name = "KEY=VALUE")]
    js_options: Vec<String>,

    /// Select the emitted output.
    #[arg(long = "emit", value_enum, default_value_t = EmitKind::Html)]
    emit: EmitKind,

    /// Manifest key of the entry point to resolve.
    #[arg(value_name = "ENTRY")]
    entry: String,
}

#[derive(Args)]
struct ProbeArgs {
    /// Request timeout in seconds.
    #[arg(long, value_name = "SECS", default_value_t = 3)]
    timeout: u64,

    /// Dev server URL to probe.
    #[arg(value_name = "URL")]
    url: Url,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmitKind {
    Html,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_panic_hook();
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Command::Resolve(args) => resolve(args).await,
        Command::Probe(args) => probe(args).await,
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::try_from_default_env().into_diagnostic()?
    } else {
        let level = match verbose {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("error,vitrail={level},vitrail_={level}"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_fmt::layer())
        .with(ErrorLayer::default())
        .init();

    Ok(())
}

async fn resolve(args: ResolveArgs) -> Result<()> {
    let mut css_options = parse_options(&args.css_options)?;
    if args.async_css {
        css_options.insert("async".to_string(), Value::Bool(true));
    }
    let js_options = parse_options(&args.js_options)?;
    let entry = args.entry.trim_start_matches('/');

    match args.emit {
        EmitKind::Html => {
            let vite = Vite::builder()
                .manifest_path(args.manifest)
                .base_url(args.base_url)
                .build();
            let mut html = HtmlTags::new();
            vite.register(entry, &css_options, &js_options, &mut html)
                .await
                .wrap_err("failed to resolve entry")?;
            println!("{}", html.render());
        }
        EmitKind::Json => {
            let manifest = FileLoader::new()
                .load(&args.manifest)
                .await
                .wrap_err("failed to load manifest")?;
            let tags = manifest
                .resolve_tags(entry, &css_options, &js_options)
                .wrap_err("failed to resolve entry")?;

            let base = args.base_url.trim_end_matches('/');
            let rebased: Vec<_> = tags
                .into_values()
                .map(|mut tag| {
                    tag.url = format!("{base}/{}", tag.url.trim_start_matches('/'));
                    tag
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&rebased).into_diagnostic()?
            );
        }
    }

    Ok(())
}

async fn probe(args: ProbeArgs) -> Result<()> {
    let timeout = Duration::from_secs(args.timeout);
    let options = ProbeOptions {
        connect_timeout: timeout.min(Duration::from_secs(1)),
        request_timeout: timeout,
    };

    let probe = DevServerProbe::with_options(args.url, options);
    if probe.is_running().await {
        println!("up");
        Ok(())
    } else {
        println!("down");
        Err(miette::miette!("dev server at `{}` is down", probe.url()))
    }
}

fn parse_options(raw: &[String]) -> Result<TagAttrs> {
    let mut attrs = TagAttrs::new();
    for option in raw {
        let (key, value) = option
            .split_once('=')
            .ok_or_else(|| miette::miette!("invalid option `{option}` (expected `key=value`)"))?;
        // Values parse as JSON when they can (bools, numbers) and fall back
        // to plain strings.
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
        attrs.insert(key.to_string(), value);
    }
    Ok(attrs)
}
