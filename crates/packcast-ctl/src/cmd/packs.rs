//! Pack registry commands.

use anyhow::{bail, Context, Result};
use packcast_services::{register_pack, PackRegistry, PackResolver, DEFAULT_PACK_NAME};

pub async fn cmd_add(
    resolver: &PackResolver,
    registry: &PackRegistry,
    name: &str,
    url: &str,
) -> Result<()> {
    println!("Calculating hash...");
    match register_pack(resolver, registry, name, url).await {
        Ok(registered) => {
            println!("Registered {}.", registered.record.name);
            println!("  url         : {}", registered.record.url);
            println!("  hash        : {}", registered.record.hash);
            println!("  size        : {} bytes", registered.size);
            println!("  description : {}", registered.description());
            Ok(())
        }
        Err(e) => bail!("failed to register {name}: {e}"),
    }
}

pub fn cmd_remove(registry: &PackRegistry, name: &str) -> Result<()> {
    // Incomplete entries are listed, so they must be removable too.
    if !registry.names().iter().any(|n| n == name) {
        println!("No pack registered as {name}.");
        return Ok(());
    }
    registry
        .remove(name)
        .with_context(|| format!("failed to remove {name}"))?;
    println!("Unregistered {name}.");
    Ok(())
}

pub fn cmd_default(registry: &PackRegistry, name: Option<&str>) -> Result<()> {
    if let Some(name) = name {
        if registry.lookup(name).is_none() {
            bail!("no pack registered as {name}");
        }
    }
    match registry.set_default(name).context("failed to set default pack")? {
        Some(record) => println!("Default pack set ({}).", record.hash),
        None => println!("Default pack cleared."),
    }
    Ok(())
}

/// Registered names, without the default slot.
fn listed_names(registry: &PackRegistry) -> Vec<String> {
    registry
        .names()
        .into_iter()
        .filter(|n| n != DEFAULT_PACK_NAME)
        .collect()
}

pub fn cmd_list(registry: &PackRegistry) -> Result<()> {
    let names = listed_names(registry);
    if names.is_empty() {
        println!("No packs registered.");
        return Ok(());
    }

    let default = registry.default_pack();

    println!("═══════════════════════════════════════");
    println!("  Packs ({})", names.len());
    println!("═══════════════════════════════════════");

    for name in &names {
        match registry.lookup(name) {
            Some(record) => {
                let marker = match &default {
                    Some(d) if d.hash == record.hash && d.url == record.url => "*",
                    _ => " ",
                };
                println!("  {} {} — {}", marker, record.name, record.hash);
                println!("      {}", record.url);
            }
            None => println!("  ? {} — incomplete entry", name),
        }
    }

    match default {
        Some(d) => println!("\n  default: {} ({})", d.url, d.hash),
        None => println!("\n  default: none"),
    }
    Ok(())
}

pub fn cmd_show(registry: &PackRegistry, name: &str) -> Result<()> {
    let record = registry
        .lookup(name)
        .with_context(|| format!("no pack registered as {name}"))?;
    println!("{}", record.name);
    println!("  url  : {}", record.url);
    println!("  hash : {}", record.hash);
    Ok(())
}

pub async fn cmd_hash(resolver: &PackResolver, url: &str) -> Result<()> {
    println!("Calculating hash...");
    let resolved = resolver
        .resolve(url)
        .await
        .with_context(|| format!("failed to fetch {url}"))?;
    println!("  hash        : {}", resolved.hash);
    println!("  size        : {} bytes", resolved.size);
    if let Some(format) = resolved.meta.pack_format {
        println!("  pack format : {}", format);
    }
    println!("  description : {}", resolved.meta.description);
    Ok(())
}
