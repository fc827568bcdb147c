/// What the user sees before a plan is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Confirmation {
    /// No summary, no prompt.
    Silent,
    /// Summary, then an automatic decline.
    SummaryOnly,
    SummaryAndPrompt,
}

impl Confirmation {
    pub(crate) fn shows_summary(self) -> bool {
        !matches!(self, Self::Silent)
    }
}

/// Dry runs always preview and never prompt; quiet only hides the summary
/// of a real restore.
pub(crate) fn confirmation_gate(quiet: bool, dry_run: bool, pending: usize) -> Confirmation {
    if dry_run {
        Confirmation::SummaryOnly
    } else if pending == 0 || quiet {
        Confirmation::Silent
    } else {
        Confirmation::SummaryAndPrompt
    }
}
