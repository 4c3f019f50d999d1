//! Error handling and display for the CLI.

use colored::Colorize;
use rotor_rotator::ledger::LedgerError;
use rotor_rotator::StepFailure;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Unsupported pool file extension: {0} (expected .json or .toml)")]
    UnsupportedPoolFile(String),

    #[error("Invalid pool file {path}: {message}")]
    InvalidPoolFile { path: String, message: String },
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".dimmed(), cause);
    }

    if let Some(failure) = err.downcast_ref::<StepFailure>() {
        if failure.is_interrupted() {
            eprintln!(
                "\n{}",
                "Hint: The operation was interrupted; it is safe to run it again.".yellow()
            );
        }
        return;
    }

    if let Some(ledger_err) = err.downcast_ref::<LedgerError>() {
        match ledger_err {
            LedgerError::Status { status, .. } if *status == 403 => {
                eprintln!(
                    "\n{}",
                    "Hint: Check that ROTOR_LEDGER_URL carries a valid SAS token.".yellow()
                );
            }
            LedgerError::Decode(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: The ledger document is not valid JSON; inspect it before resetting."
                        .yellow()
                );
            }
            _ => {}
        }
    }
}
