use anyhow::Result;
use std::fmt::Write as _;

use crate::config::{Config, PROVIDERS};
use crate::embedding;

pub fn list_providers(config: &Config) -> Result<()> {
    print!("{}", render_providers(config));
    Ok(())
}

/// One row per known provider; the configured one is marked active with
/// its model and dimensions.
pub fn render_providers(config: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:<10} {:<7} MODEL",
        "PROVIDER", "AVAILABLE", "ACTIVE"
    );

    for name in PROVIDERS {
        let active = config.embedding.provider == *name;
        let model = if active {
            describe_model(config)
        } else {
            String::new()
        };
        let row = format!(
            "{:<10} {:<10} {:<7} {}",
            name,
            embedding::is_available(name),
            active,
            model
        );
        let _ = writeln!(out, "{}", row.trim_end());
    }

    out
}

fn describe_model(config: &Config) -> String {
    let emb = &config.embedding;
    let (model, dims) = match emb.provider.as_str() {
        "disabled" => return "-".to_string(),
        "local" => {
            let (name, dims) = embedding::resolve_local_model(emb);
            (name, Some(dims))
        }
        _ => (emb.model.clone().unwrap_or_default(), emb.dims),
    };
    match dims {
        Some(d) => format!("{} ({} dims)", model, d),
        None => model,
    }
}
