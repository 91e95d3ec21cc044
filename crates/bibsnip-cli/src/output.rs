use owo_colors::OwoColorize;

/// Whether to use colored status output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Neutral progress line. Status goes to stderr so stdout stays a clean
/// BibTeX stream.
pub fn status(color: ColorMode, msg: &str) {
    if color.enabled() {
        eprintln!("{}", msg.dimmed());
    } else {
        eprintln!("{msg}");
    }
}

pub fn success(color: ColorMode, msg: &str) {
    if color.enabled() {
        eprintln!("{}", msg.green());
    } else {
        eprintln!("{msg}");
    }
}

pub fn error(color: ColorMode, msg: &str) {
    if color.enabled() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{msg}");
    }
}

/// Bound a provider error for one status line.
pub fn shorten(msg: &str, cap: usize) -> String {
    if msg.chars().count() > cap {
        let capped: String = msg.chars().take(cap).collect();
        format!("{capped}...")
    } else {
        msg.to_string()
    }
}
