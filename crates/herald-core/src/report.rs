//! Human-readable status messages.
//!
//! Colour output uses mIRC control codes: `\x02` bold, `\x03NN` colour and
//! `\x0f` reset. Plain mode drops them.

use crate::aggregator::ReportSnapshot;

const BOLD: &str = "\x02";
const GREEN: &str = "\x0303";
const RED: &str = "\x0304";
const RESET: &str = "\x0f";

/// Turns fired reports into channel messages.
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    status_url: Option<String>,
    colors: bool,
}

impl ReportFormatter {
    pub fn new(status_url: Option<String>, colors: bool) -> Self {
        Self { status_url, colors }
    }

    pub fn status_url(&self) -> Option<&str> {
        self.status_url.as_deref()
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    /// Render a fired report.
    ///
    /// `current_failures` is a live query taken at report time, not part of
    /// the snapshot; when it is empty the message says everything is green.
    pub fn format(&self, report: &ReportSnapshot, current_failures: &[String]) -> String {
        let marker = match report.revision.as_deref() {
            Some(rev) => format!("r{}", self.paint(BOLD, rev)),
            None => "an unknown revision".to_string(),
        };
        let mut msg = format!("Build status changed with {marker}: ");

        let mut clauses = Vec::with_capacity(2);
        if !report.succeeded.is_empty() {
            clauses.push(format!(
                "{}: {}",
                self.paint(GREEN, "Success"),
                sorted_list(&report.succeeded)
            ));
        }
        if !report.failed.is_empty() {
            clauses.push(format!(
                "{}: {}",
                self.paint(RED, "Failure"),
                sorted_list(&report.failed)
            ));
        }
        msg.push_str(&clauses.join("; "));

        if current_failures.is_empty() {
            msg.push_str(". Nice work, all builders built fine now");
        }
        if let Some(url) = &self.status_url {
            msg.push_str(". ");
            msg.push_str(url);
        }
        msg
    }
}

/// Answer to the STATUS command.
pub fn format_status(failing: &[String], status_url: Option<&str>) -> String {
    match failing {
        [] => "Last time I checked, all builders built just fine".to_string(),
        [only] => format!("{only} is currently not building"),
        many => {
            let mut msg = format!(
                "{} builders are currently not building: {}",
                many.len(),
                sorted_list(many)
            );
            if let Some(url) = status_url {
                msg.push_str(", see ");
                msg.push_str(url);
            }
            msg
        }
    }
}

fn sorted_list(names: &[String]) -> String {
    let mut names: Vec<&str> = names.iter().map(String::as_str).collect();
    names.sort_unstable();
    names.join(", ")
}
