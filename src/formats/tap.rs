use crate::utils::string;

pub fn print_version() {
    println!("TAP version 14")
}

pub fn print_plan(start: usize, end: usize) {
    println!("{}..{}", start, end)
}

pub fn print_ok(test_number: usize, message: &str, indent_level: usize) {
    println!("{}", ok_line(test_number, message, indent_level))
}

pub fn print_not_ok(test_number: usize, message: &str, diagnostics: &str, indent_level: usize) {
    println!(
        "not ok {:>indent$} - {}",
        test_number,
        message,
        indent = indent_level
    );
    if !diagnostics.is_empty() {
        print_diagnostics(diagnostics)
    }
}

pub fn print_skip(test_number: usize, message: &str, reason: &str, indent_level: usize) {
    println!("{}", skip_line(test_number, message, reason, indent_level))
}

pub fn print_diagnostics(diagnostics: &str) {
    println!("{}", diagnostics_block(diagnostics));
}

pub fn print_bail_out(message: &str) {
    println!("Bail out! {}", message)
}

fn ok_line(test_number: usize, message: &str, indent_level: usize) -> String {
    format!(
        "ok     {:>indent$} - {}",
        test_number,
        message,
        indent = indent_level
    )
}

// A SKIP directive ends at the end of the line
fn skip_line(test_number: usize, message: &str, reason: &str, indent_level: usize) -> String {
    let reason = reason.lines().next().unwrap_or_default();
    format!(
        "{} # SKIP {}",
        ok_line(test_number, message, indent_level),
        reason
    )
}

fn diagnostics_block(diagnostics: &str) -> String {
    let code_block = format!("---\n{}...", diagnostics);
    string::indent_lines(&code_block, 2)
}
