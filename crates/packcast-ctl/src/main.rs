//! packcast-ctl — command-line interface for the pack registry.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use packcast_core::config::PackcastConfig;
use packcast_services::{PackRegistry, PackResolver, TomlDocument};

mod cmd;

use cmd::packs;

fn print_usage() {
    println!("Usage: packcast-ctl [--config <path>] <command>");
    println!();
    println!("Commands:");
    println!("  add <name> <url>   Download, hash and register a pack");
    println!("  remove <name>      Unregister a pack");
    println!("  default [<name>]   Set the default pack, or clear it");
    println!("  list               List registered packs");
    println!("  show <name>        Show one pack's url and hash");
    println!("  hash <url>         Download and hash a pack without registering it");
    println!();
    println!("Options:");
    println!("  --config <path>    Config file (default: {})", PackcastConfig::file_path().display());
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --config option
    let mut config_path: Option<PathBuf> = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--config" {
            i += 1;
            config_path = Some(PathBuf::from(
                args.get(i).context("--config requires a value")?,
            ));
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    if matches!(remaining.as_slice(), ["help"] | ["--help"] | ["-h"] | []) {
        print_usage();
        return Ok(());
    }

    let config = match config_path {
        Some(path) => PackcastConfig::load_from(path),
        None => PackcastConfig::load(),
    }
    .context("failed to load config")?;

    let doc_path = &config.registry.document_path;
    let doc = TomlDocument::open(doc_path)
        .with_context(|| format!("failed to open pack document {}", doc_path.display()))?;
    tracing::debug!(path = %doc_path.display(), "pack document opened");
    let registry = PackRegistry::new(Arc::new(doc));

    match remaining.as_slice() {
        ["add", name, url] => {
            let resolver = PackResolver::new(&config.resolver)?;
            packs::cmd_add(&resolver, &registry, name, url).await
        }
        ["remove", name]    => packs::cmd_remove(&registry, name),
        ["default"]         => packs::cmd_default(&registry, None),
        ["default", name]   => packs::cmd_default(&registry, Some(*name)),
        ["list"]            => packs::cmd_list(&registry),
        ["show", name]      => packs::cmd_show(&registry, name),
        ["hash", url] => {
            let resolver = PackResolver::new(&config.resolver)?;
            packs::cmd_hash(&resolver, url).await
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
