//! # Pretty printing
//!
//! Terminal rendering of a computed path as a vertical timeline:
//!
//! ```text
//!  1  6.006  Introduction to Algorithms
//!  │         Sorting, searching and graph problems.
//!  2  6.046  Design and Analysis of Algorithms
//!  │         ...
//!  3  18.404 Theory of Computation
//! ```
//!
//! Step numbers are bold cyan, codes yellow, labels bold; descriptions are
//! wrapped plain text. Colours go through `crossterm`, so any `Write` sink works
//! and tests can render into a `Vec<u8>`.

use crossterm::{
    QueueableCommand,
    style::{Attribute, Color, SetAttribute, SetForegroundColor},
};
use std::error::Error;
use std::io::{Write, stdout};

use crate::hydrate::StepContent;

const DESCRIPTION_WIDTH: usize = 72;

/// Print `steps` to stdout.
pub fn print_path(steps: &[StepContent]) -> Result<(), Box<dyn Error>> {
    let mut out = stdout().lock();
    render_path(steps, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Render `steps` as a timeline into `out`.
pub fn render_path<W: Write>(steps: &[StepContent], out: &mut W) -> Result<(), Box<dyn Error>> {
    if steps.is_empty() {
        writeln!(out, "(empty path)")?;
        return Ok(());
    }

    let code_width = steps.iter().map(|s| s.code.chars().count()).max().unwrap_or(0);
    let step_width = steps.len().to_string().len();
    let indent = " ".repeat(code_width + 3);

    for (i, step) in steps.iter().enumerate() {
        out.queue(SetForegroundColor(Color::Cyan))?;
        out.queue(SetAttribute(Attribute::Bold))?;
        write!(out, " {:>width$}  ", step.step, width = step_width)?;
        out.queue(SetAttribute(Attribute::Reset))?;

        out.queue(SetForegroundColor(Color::Yellow))?;
        write!(out, "{:<width$} ", step.code, width = code_width)?;
        out.queue(SetForegroundColor(Color::Reset))?;

        out.queue(SetAttribute(Attribute::Bold))?;
        writeln!(out, "{}", step.label)?;
        out.queue(SetAttribute(Attribute::Reset))?;

        let is_last = i + 1 == steps.len();
        let rail = if is_last { " " } else { "│" };
        for line in wrap(&step.description, DESCRIPTION_WIDTH) {
            writeln!(out, " {:>width$}{}{}", rail, indent, line, width = step_width)?;
        }
    }
    Ok(())
}

/// Greedy word wrap.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
