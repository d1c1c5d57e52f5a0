//! Subcommands

pub mod annotate;
pub mod status;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::{API_KEY_ENV, Config, mask_secret};

/// Print the effective configuration, API key masked
pub fn print_config(config: &Config) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let api = &config.api;
    let pipeline = &config.pipeline;
    let api_key = match api.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(key) => mask_secret(key),
        None => format!("not set (export {API_KEY_ENV})"),
    };

    table.add_row(vec!["API base URL", &api.base_url]);
    table.add_row(vec!["Model", &api.model]);
    table.add_row(vec!["API key", &api_key]);
    table.add_row(vec!["Temperature", &api.temperature.to_string()]);
    table.add_row(vec!["Max tokens", &api.max_tokens.to_string()]);
    table.add_row(vec!["Request timeout", &format!("{}s", api.timeout_secs)]);
    table.add_row(vec!["Workers", &pipeline.workers.to_string()]);
    table.add_row(vec![
        "Rate limit",
        &format!("{} requests/min", pipeline.requests_per_minute),
    ]);
    table.add_row(vec![
        "Checkpoint every",
        &format!("{} rows", pipeline.save_interval),
    ]);
    table.add_row(vec![
        "Max retries",
        &format!(
            "{} (backoff base {}ms)",
            pipeline.max_retries, pipeline.backoff_base_ms
        ),
    ]);
    table.add_row(vec!["Max chars", &pipeline.max_chars.to_string()]);
    table.add_row(vec!["Content column", &pipeline.content_column]);

    eprintln!("\n{table}");
}
