//! Console rendering of per-question outcomes.

use owo_colors::OwoColorize;

use crate::{execution::ExecutionOutcome, pipeline::{BatchSummary, Outcome}};

pub struct TextPrinter {
    pub color: Option<&'static str>,
}

impl TextPrinter {
    pub fn print(&self, text: &str) {
        if let Some(c) = self.color {
            match c {
                "green" => println!("{}", text.green()),
                "cyan" => println!("{}", text.cyan()),
                "red" => println!("{}", text.red()),
                "yellow" => println!("{}", text.yellow()),
                _ => println!("{}", text),
            }
        } else {
            println!("{}", text);
        }
    }
}

/// First non-empty line of a question, cut to `max` characters.
pub fn question_label(question: &str, max: usize) -> String {
    let line = question.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.chars().count() <= max {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max).collect();
        format!("{}...", cut)
    }
}

pub fn print_image_description(description: &str) {
    TextPrinter { color: Some("cyan") }.print(&format!("Image Description: {}", description));
}

pub fn print_outcome(question: &str, outcome: &Outcome) {
    let label = question_label(question, 60);
    match outcome {
        Outcome::Executed(ExecutionOutcome::Success { output }) => {
            TextPrinter { color: Some("green") }.print(&format!("Execution output for \"{}\":", label));
            TextPrinter { color: None }.print(output.trim_end());
        }
        Outcome::Executed(ExecutionOutcome::Timeout { after }) => {
            TextPrinter { color: Some("yellow") }
                .print(&format!("Timeout occurred for question \"{}\" after {:?}", label, after));
        }
        Outcome::Executed(ExecutionOutcome::Failed { code, output }) => {
            let code = code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into());
            TextPrinter { color: Some("red") }
                .print(&format!("Execution failed for question \"{}\" (exit {}). Error:", label, code));
            TextPrinter { color: None }.print(output.trim_end());
        }
        Outcome::Executed(ExecutionOutcome::Error { message }) => {
            TextPrinter { color: Some("red") }.print(&format!("Exception for question \"{}\": {}", label, message));
        }
        Outcome::Skipped { attempts } => {
            TextPrinter { color: Some("yellow") }.print(&format!(
                "For question \"{}\" - cannot find valid code after {} attempts, skipping it.",
                label, attempts
            ));
        }
    }
}

pub fn print_error(question: &str, err: &anyhow::Error) {
    TextPrinter { color: Some("red") }
        .print(&format!("Exception for question \"{}\": {:#}", question_label(question, 60), err));
}

pub fn print_summary(summary: &BatchSummary) {
    TextPrinter { color: Some("cyan") }.print(&format!(
        "{} question(s): {} succeeded, {} timed out, {} failed, {} skipped, {} errors",
        summary.total(),
        summary.succeeded,
        summary.timed_out,
        summary.failed,
        summary.skipped,
        summary.errors
    ));
}
