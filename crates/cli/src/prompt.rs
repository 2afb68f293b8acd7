//! Interactive manual-resolution channel, backed by stdin.

use std::io::{BufRead, Write};

use absentia_core::CountyRow;
use absentia_recon::{PromptAnswer, RegistrationPrompt};

/// Asks the operator for a registration number when identity resolution is
/// ambiguous. `s` skips the row.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl StdinPrompt {
    pub fn new() -> Self {
        Self
    }
}

impl RegistrationPrompt for StdinPrompt {
    fn ask(&mut self, row: &CountyRow) -> PromptAnswer {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();

        eprintln!(
            "Could not uniquely match: {} {} {} | {}",
            row.first_name,
            row.middle_name.as_deref().unwrap_or("-"),
            row.last_name,
            row.address.as_deref().unwrap_or("(no address)"),
        );

        loop {
            eprint!("Registration number for this voter (s to skip): ");
            let _ = stdout.flush();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                return PromptAnswer::Skip;
            }
            let line = line.trim();

            if line.eq_ignore_ascii_case("s") {
                return PromptAnswer::Skip;
            }
            match line.parse::<i64>() {
                Ok(reg) => return PromptAnswer::Registration(reg),
                Err(_) => eprintln!("Not a number"),
            }
        }
    }
}
