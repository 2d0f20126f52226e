// src/utils/log.rs

//! Banner and summary formatting on top of the `log` facade.
//!
//! Per-source lines go straight through `log::info!` and friends; these
//! helpers only shape the run header and the closing summary block.

const BORDER_WIDTH: usize = 60;

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(BORDER_WIDTH);
    log::info!("{border}");
    log::info!("  {title}");
    log::info!("{border}");
}

/// Log a separator line
pub fn separator() {
    log::info!("{}", "─".repeat(BORDER_WIDTH));
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    log::info!("    {message}");
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {title}");
    for line in format_items(items) {
        log::info!("{line}");
    }
}

/// Align `key: value` pairs under a summary title.
fn format_items(items: &[(&str, String)]) -> Vec<String> {
    let width = items.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    items
        .iter()
        .map(|(key, value)| format!("    {key:<width$} : {value}"))
        .collect()
}
