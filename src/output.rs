use std::io::{BufRead, Write};

/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!` so that
/// tests can capture what a command printed.
pub trait UserOutput: Send + Sync {
    /// Informational status message (e.g., "Stopping shop-db...")
    fn status(&self, message: &str);

    /// Success message (e.g., "shop-db is running")
    fn success(&self, message: &str);

    /// Warning message
    fn warning(&self, message: &str);

    /// Error message
    fn error(&self, message: &str);

    /// Ask a question and read one line of the answer.
    fn prompt(&self, question: &str) -> Option<String>;
}

/// Standard CLI output. Writes to stdout/stderr with ANSI colors.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("\x1b[32m{}\x1b[0m", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m{}\x1b[0m", message);
    }

    fn error(&self, message: &str) {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    }

    fn prompt(&self, question: &str) -> Option<String> {
        print!("{} ", question);
        std::io::stdout().flush().ok();
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(answer.trim().to_string()),
        }
    }
}

/// Whether prompts can be shown.
pub fn is_interactive() -> bool {
    use std::io::IsTerminal;
    if std::env::var_os("DBKEEPER_NON_INTERACTIVE").is_some() {
        return false;
    }
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// Replace a secret value for display.
pub fn mask_secret(value: &str) -> String {
    if value.is_empty() {
        "(empty)".to_string()
    } else {
        "***".to_string()
    }
}
