//! Rustyline helper integration
//!
//! Completion of builtins, special forms and console definitions, history
//! hints, and validation that keeps reading while parens are unbalanced.

use std::borrow::Cow;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Helper};

use super::completeness::{check_completeness, CompletenessStatus};
use crate::backend::script::{BUILTIN_NAMES, SPECIAL_FORMS};

const LOADER_FUNCTIONS: &[&str] = &["require", "resolve", "exports", "module"];

const MAX_HINT_HISTORY: usize = 100;

/// Console helper
#[derive(Default)]
pub struct ScriptHelper {
    command_history: Vec<String>,
    defined_names: Vec<String>,
}

impl ScriptHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add command to history for hints
    pub fn add_to_history(&mut self, cmd: String) {
        if self.command_history.len() >= MAX_HINT_HISTORY {
            self.command_history.remove(0);
        }
        self.command_history.push(cmd);
    }

    /// Remember names bound by `(define name ...)` / `(define (name ...) ...)`
    /// in a console entry.
    pub fn record_definitions(&mut self, entry: &str) {
        let mut rest = entry;
        while let Some(start) = rest.find("(define") {
            rest = &rest[start + "(define".len()..];
            let name: String = rest
                .trim_start()
                .trim_start_matches('(')
                .chars()
                .take_while(|c| !c.is_whitespace() && *c != '(' && *c != ')')
                .collect();
            if !name.is_empty() && !self.defined_names.contains(&name) {
                self.defined_names.push(name);
            }
        }
        self.defined_names.sort();
    }

    fn all_completions(&self) -> impl Iterator<Item = &str> {
        BUILTIN_NAMES
            .iter()
            .chain(SPECIAL_FORMS)
            .chain(LOADER_FUNCTIONS)
            .copied()
            .chain(self.defined_names.iter().map(String::as_str))
    }
}

impl Completer for ScriptHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_before_cursor = &line[..pos];
        let word_start = line_before_cursor
            .rfind(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == '\'')
            .map(|i| i + 1)
            .unwrap_or(0);
        let partial = &line_before_cursor[word_start..];

        if partial.trim().is_empty() {
            return Ok((pos, vec![]));
        }

        let mut matches: Vec<Pair> = self
            .all_completions()
            .filter(|comp| comp.starts_with(partial))
            .map(|comp| Pair {
                display: comp.to_string(),
                replacement: comp.to_string(),
            })
            .collect();
        matches.sort_by(|a, b| a.display.cmp(&b.display));
        matches.dedup_by(|a, b| a.display == b.display);

        Ok((word_start, matches))
    }
}

impl Hinter for ScriptHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if line.is_empty() || pos < line.len() {
            return None;
        }
        self.command_history
            .iter()
            .rev()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for ScriptHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        // Dim the hint
        Cow::Owned(format!("\x1b[90m{}\x1b[0m", hint))
    }
}

impl Validator for ScriptHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        match check_completeness(ctx.input()) {
            CompletenessStatus::Complete => Ok(ValidationResult::Valid(None)),
            CompletenessStatus::Incomplete { .. } => Ok(ValidationResult::Incomplete),
            CompletenessStatus::Invalid { reason } => Ok(ValidationResult::Invalid(Some(reason))),
        }
    }
}

impl Helper for ScriptHelper {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_definitions() {
        let mut helper = ScriptHelper::new();
        helper.record_definitions("(define answer 42) (define (square n) (* n n))");
        assert_eq!(helper.defined_names, vec!["answer", "square"]);
        helper.record_definitions("(define answer 43)");
        assert_eq!(helper.defined_names.len(), 2);
    }

    #[test]
    fn test_completion_sources() {
        let mut helper = ScriptHelper::new();
        helper.record_definitions("(define required-count 1)");
        let names: Vec<_> = helper
            .all_completions()
            .filter(|n| n.starts_with("req"))
            .collect();
        assert!(names.contains(&"require"));
        assert!(names.contains(&"required-count"));
    }

    #[test]
    fn test_completes_every_special_form() {
        let helper = ScriptHelper::new();
        let names: Vec<_> = helper.all_completions().collect();
        for form in SPECIAL_FORMS {
            assert!(names.contains(form), "missing special form {}", form);
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut helper = ScriptHelper::new();
        for i in 0..(MAX_HINT_HISTORY + 5) {
            helper.add_to_history(format!("(print {})", i));
        }
        assert_eq!(helper.command_history.len(), MAX_HINT_HISTORY);
        assert_eq!(helper.command_history[0], "(print 5)");
    }
}
