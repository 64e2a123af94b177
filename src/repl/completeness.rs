//! Input completeness checking for multi-line console entries

/// Completeness of the text typed so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletenessStatus {
    /// Input is complete and can be evaluated
    Complete,
    /// Input is incomplete, needs more lines
    Incomplete {
        missing_close_parens: usize,
        unclosed_string: bool,
    },
    /// Input has a closing paren without a matching opening one
    Invalid { reason: String },
}

/// Check whether `input` has balanced parens outside strings and comments.
pub fn check_completeness(input: &str) -> CompletenessStatus {
    let mut paren_depth: usize = 0;
    let mut in_string = false;
    let mut in_comment = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            continue;
        }

        if in_string {
            match ch {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            ';' => in_comment = true,
            '"' => in_string = true,
            '(' => paren_depth += 1,
            ')' => {
                if paren_depth == 0 {
                    return CompletenessStatus::Invalid {
                        reason: "Unexpected closing parenthesis ')'".to_string(),
                    };
                }
                paren_depth -= 1;
            }
            _ => {}
        }
    }

    if in_string || paren_depth > 0 {
        return CompletenessStatus::Incomplete {
            missing_close_parens: paren_depth,
            unclosed_string: in_string,
        };
    }

    CompletenessStatus::Complete
}
