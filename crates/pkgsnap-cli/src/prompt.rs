use std::io::{self, BufRead, IsTerminal, Write};

use dialoguer::Confirm;
use pkgsnap_core::PkgSnapError;

use crate::render::{TerminalProgress, TerminalRenderer};

/// The restore workflow's view of the user.
pub(crate) trait Prompter {
    fn show(&mut self, lines: &[String]);

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool, PkgSnapError>;

    fn begin_apply(&mut self, _actions: usize) {}

    fn finish_apply(&mut self, _succeeded: bool) {}
}

pub(crate) struct TerminalPrompter {
    renderer: TerminalRenderer,
    progress: Option<TerminalProgress>,
}

impl TerminalPrompter {
    pub(crate) fn new(renderer: TerminalRenderer) -> Self {
        Self {
            renderer,
            progress: None,
        }
    }
}

impl Prompter for TerminalPrompter {
    fn show(&mut self, lines: &[String]) {
        self.renderer.print_lines(lines);
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool, PkgSnapError> {
        if !io::stdin().is_terminal() {
            return confirm_from_line(io::stdin().lock(), question, default);
        }
        Confirm::new()
            .with_prompt(question)
            .default(default)
            .interact()
            .map_err(|err| PkgSnapError::io("failed to read confirmation", io::Error::other(err)))
    }

    fn begin_apply(&mut self, actions: usize) {
        self.progress = Some(
            self.renderer
                .start_progress(&format!("applying {actions} change(s)")),
        );
    }

    fn finish_apply(&mut self, succeeded: bool) {
        if let Some(progress) = self.progress.take() {
            if succeeded {
                progress.finish_success();
            } else {
                progress.finish_abandon();
            }
        }
    }
}

/// Reads one `y`/`n` answer from a non-terminal stdin; anything else is the
/// default.
fn confirm_from_line<R: BufRead>(
    mut input: R,
    question: &str,
    default: bool,
) -> Result<bool, PkgSnapError> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    print!("{question} {hint}: ");
    io::stdout()
        .flush()
        .map_err(|err| PkgSnapError::io("failed to flush standard output", err))?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .map_err(|err| PkgSnapError::io("failed to read confirmation", err))?;
    Ok(match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_answers_are_case_insensitive() {
        assert!(confirm_from_line(&b"YES\n"[..], "Proceed?", false).expect("answer"));
        assert!(!confirm_from_line(&b"n\n"[..], "Proceed?", true).expect("answer"));
    }

    #[test]
    fn empty_or_closed_input_takes_the_default() {
        assert!(!confirm_from_line(&b"\n"[..], "Proceed?", false).expect("answer"));
        assert!(confirm_from_line(&b""[..], "Proceed?", true).expect("answer"));
    }
}
