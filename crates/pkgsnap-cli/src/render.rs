use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use pkgsnap_resolver::{ActionKind, Plan};

use crate::restore_flow::RestoreOutcome;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    if no_color || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    label: String,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    pub(crate) fn current() -> Self {
        Self {
            style: current_output_style(),
        }
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn print_warning(self, message: &str) {
        eprintln!("{}", render_status_line(self.style, "warn", message));
    }

    pub(crate) fn start_progress(self, label: &str) -> TerminalProgress {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}") {
                progress_bar.set_style(style.tick_chars(".oO@* "));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        TerminalProgress {
            style: self.style,
            label: label.to_string(),
            progress_bar,
            started_at: Instant::now(),
        }
    }
}

impl TerminalProgress {
    pub(crate) fn finish_success(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };
        progress_bar.finish_and_clear();
        println!(
            "{} complete in {}",
            colorize(self.style, progress_label_style(), &self.label),
            format_elapsed(self.started_at.elapsed())
        );
    }

    pub(crate) fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = match status {
                "ok" => "[OK]",
                "warn" => "[WARN]",
                "err" => "[ERR]",
                _ => "[..]",
            };
            format!("{badge} {message}")
        }
    }
}

/// Plan summary shown before confirmation, grouped by action.
pub(crate) fn format_summary_lines(plan: &Plan, style: OutputStyle) -> Vec<String> {
    let mut lines = vec![
        colorize(
            style,
            section_style(),
            &format!(
                "The following {} package(s) will be affected (of {} checked):",
                plan.action_count(),
                plan.checked
            ),
        ),
        String::new(),
    ];

    let groups: [(&str, fn(&ActionKind) -> bool); 3] = [
        ("New packages to be INSTALLED:", |kind| {
            matches!(kind, ActionKind::Install)
        }),
        ("Installed packages to be UPGRADED:", |kind| {
            matches!(kind, ActionKind::Upgrade { .. })
        }),
        ("Installed packages to be DOWNGRADED:", |kind| {
            matches!(kind, ActionKind::Downgrade { .. })
        }),
    ];
    for (title, selects) in groups {
        let actions = plan
            .actions
            .iter()
            .filter(|action| selects(&action.kind))
            .collect::<Vec<_>>();
        if actions.is_empty() {
            continue;
        }
        lines.push(title.to_string());
        for action in actions {
            let line = match action.kind.replaced_version() {
                Some(from) => format!(
                    "\t{}: {} -> {} [{}]",
                    action.manifest.name, from, action.manifest.version, action.source
                ),
                None => format!(
                    "\t{}: {} [{}]",
                    action.manifest.name, action.manifest.version, action.source
                ),
            };
            lines.push(line);
        }
        lines.push(String::new());
    }
    lines
}

pub(crate) fn format_conflict_lines() -> Vec<String> {
    vec![
        "Conflicts with the existing packages have been found.".to_string(),
        "One more solver iteration is needed to resolve them.".to_string(),
    ]
}

pub(crate) fn format_restore_outcome_lines(
    outcome: &RestoreOutcome,
    style: OutputStyle,
) -> Vec<String> {
    match outcome {
        RestoreOutcome::NoChangesNeeded { .. } => vec![render_status_line(
            style,
            "ok",
            "The most recent versions of packages are already installed",
        )],
        RestoreOutcome::Applied { report, attempts } => {
            let mut message = format!("restored {} package(s)", report.installed.len());
            if *attempts > 1 {
                message.push_str(&format!(" after {attempts} solver iterations"));
            }
            vec![render_status_line(style, "ok", &message)]
        }
        RestoreOutcome::Declined { dry_run: true } => Vec::new(),
        RestoreOutcome::Declined { dry_run: false } => vec![render_status_line(
            style,
            "..",
            "Restore declined; no changes were made",
        )],
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn colorize(output: OutputStyle, style: Style, text: &str) -> String {
    match output {
        OutputStyle::Plain => text.to_string(),
        OutputStyle::Rich => format!("{}{}{}", style.render(), text, style.render_reset()),
    }
}
