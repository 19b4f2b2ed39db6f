//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};

use bankvault_core::OperationResult;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Print why an operation failed, one line per invalid field
pub fn failure<T>(result: &OperationResult<T>) {
    let fields = result
        .context
        .as_ref()
        .and_then(|c| c.get("fields"))
        .and_then(|f| f.as_array());

    match fields {
        Some(fields) => {
            error("Please fix the following:");
            for field in fields {
                eprintln!(
                    "  {} {}",
                    format!("{}:", field["field"].as_str().unwrap_or("?")).bold(),
                    field["message"].as_str().unwrap_or("")
                );
            }
        }
        None => error(result.error.as_deref().unwrap_or("Operation failed")),
    }
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}
