//! Placeholder handling for caller-supplied condition fragments.
//!
//! Conditions use `%s` for every bound value and `%%` for a literal percent
//! sign. Text inside quoted regions (`'...'`, `"..."`, `` `...` `` and
//! `[...]`) is copied verbatim.
//! Outside quotes a fragment must stay a single expression: statement
//! separators, comments and any other parameter syntax are refused so that
//! the placeholder count always lines up with the bound parameter list.

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Statement text with `?` in place of every `%s`.
    pub sql: String,
    pub placeholders: usize,
}

/// Validates a fragment and returns how many `%s` placeholders it holds.
pub fn count(fragment: &str) -> AppResult<usize> {
    render(fragment).map(|r| r.placeholders)
}

/// Rewrites `%s` to SQLite's positional `?` and `%%` to `%`.
pub fn render(sql: &str) -> AppResult<Rendered> {
    let mut out = String::with_capacity(sql.len());
    let mut placeholders = 0;
    // Closing character of the quoted region the scanner is inside.
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(close) = quote {
            out.push(c);
            if c == close {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '[' => {
                quote = Some(']');
                out.push(c);
            }
            '%' => match chars.next() {
                Some('s') => {
                    placeholders += 1;
                    out.push('?');
                }
                Some('%') => out.push('%'),
                _ => {
                    return Err(AppError::validation(
                        "stray '%' in condition; use %s for values and %% for a literal percent",
                    ))
                }
            },
            ';' => return Err(AppError::validation("condition must not contain ';'")),
            '-' if chars.peek() == Some(&'-') => {
                return Err(AppError::validation("condition must not contain comments"))
            }
            '/' if chars.peek() == Some(&'*') => {
                return Err(AppError::validation("condition must not contain comments"))
            }
            '?' => {
                return Err(AppError::validation(
                    "condition must use %s placeholders, not '?'",
                ))
            }
            ':' | '@' | '$'
                if chars
                    .peek()
                    .is_some_and(|n| n.is_ascii_alphanumeric() || *n == '_') =>
            {
                return Err(AppError::validation(format!(
                    "condition must use %s placeholders, not '{c}name' parameters"
                )))
            }
            _ => out.push(c),
        }
    }

    if quote.is_some() {
        return Err(AppError::validation("unterminated quoted literal in condition"));
    }

    Ok(Rendered { sql: out, placeholders })
}
