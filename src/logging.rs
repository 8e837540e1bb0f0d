//! Pretty-printing messages to the console

use colored::Colorize;

/// Pretty-print an error message to the console
pub fn error(error_message: String) {
    let error_title = "error:".red().bold();
    eprintln!("{} {}", error_title, error_message);
}

/// Pretty-print a warning message to the console
pub fn warning(message: String, line_number: usize) {
    let warning = "warning:".yellow().bold();
    eprintln!("{} line {}: {}", warning, line_number, message);
}

/// Pretty-print one step of a `-d` runner trace: the tick number and the
/// source line the about-to-run instruction came from.
pub fn trace_tick(tick: u32, x: u8, y: u8, source_line: Option<u16>) {
    let tag = "tick:".cyan().bold();
    match source_line {
        Some(line) => eprintln!("{} {tick} block ({x},{y}) line {line}", tag),
        None => eprintln!("{} {tick} block ({x},{y})", tag),
    }
}
