//! Attribute path parsing.
//!
//! A path such as `info.tags[0].name` addresses a possibly nested attribute.
//! `.` separates map keys, `[n]` dereferences a list element, and a backslash
//! escapes a literal `.`, `[` or backslash inside a name.

use std::fmt;

use crate::error::{ClientError, ClientResult};

/// A single element of an attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// A map key or top-level attribute name.
    AttributeName(String),
    /// A list index dereference.
    ListIndex(usize),
}

/// A parsed attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    /// The path elements in order. Never empty, and never opens with a
    /// [`PathElement::ListIndex`].
    pub elements: Vec<PathElement>,
}

impl AttributePath {
    /// Parse a path string.
    pub fn parse(path: &str) -> ClientResult<Self> {
        parse(path).map(|elements| Self { elements })
    }

    /// Whether the path names a top-level attribute with no nesting.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        matches!(self.elements.as_slice(), [PathElement::AttributeName(_)])
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, elem) in self.elements.iter().enumerate() {
            match elem {
                PathElement::AttributeName(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    for c in name.chars() {
                        if matches!(c, '.' | '[' | '\\') {
                            write!(f, "\\{c}")?;
                        } else {
                            write!(f, "{c}")?;
                        }
                    }
                }
                PathElement::ListIndex(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Escaped,
    ListIndex,
    AfterListIndex,
}

/// Tokenize a path string into its elements in a single pass.
pub fn parse(path: &str) -> ClientResult<Vec<PathElement>> {
    let mut elements = Vec::new();
    let mut buf = String::new();
    let mut state = State::Normal;

    for c in path.chars() {
        state = match state {
            State::Normal => match c {
                '\\' => State::Escaped,
                '.' => {
                    if buf.is_empty() {
                        return Err(ClientError::malformed_path(path, "empty path segment"));
                    }
                    elements.push(PathElement::AttributeName(std::mem::take(&mut buf)));
                    State::Normal
                }
                '[' => {
                    if buf.is_empty() {
                        return Err(ClientError::malformed_path(
                            path,
                            "list index must follow an attribute name",
                        ));
                    }
                    elements.push(PathElement::AttributeName(std::mem::take(&mut buf)));
                    State::ListIndex
                }
                _ => {
                    buf.push(c);
                    State::Normal
                }
            },
            State::Escaped => {
                if !matches!(c, '.' | '[' | '\\') {
                    buf.push('\\');
                }
                buf.push(c);
                State::Normal
            }
            State::ListIndex => match c {
                ']' => {
                    if buf.is_empty() {
                        return Err(ClientError::malformed_path(path, "empty list index"));
                    }
                    let index = buf.parse().map_err(|_| {
                        ClientError::malformed_path(path, format!("list index `{buf}` too large"))
                    })?;
                    buf.clear();
                    elements.push(PathElement::ListIndex(index));
                    State::AfterListIndex
                }
                '0'..='9' => {
                    buf.push(c);
                    State::ListIndex
                }
                _ => {
                    return Err(ClientError::malformed_path(
                        path,
                        format!("non-digit `{c}` in list index"),
                    ));
                }
            },
            State::AfterListIndex => match c {
                '.' => State::Normal,
                '[' => State::ListIndex,
                _ => {
                    return Err(ClientError::malformed_path(
                        path,
                        format!("unexpected `{c}` after list index"),
                    ));
                }
            },
        };
    }

    match state {
        State::Normal if buf.is_empty() => {
            Err(ClientError::malformed_path(path, "empty path segment"))
        }
        State::Normal => {
            elements.push(PathElement::AttributeName(buf));
            Ok(elements)
        }
        State::Escaped => {
            buf.push('\\');
            elements.push(PathElement::AttributeName(buf));
            Ok(elements)
        }
        State::ListIndex => Err(ClientError::malformed_path(path, "unterminated list index")),
        State::AfterListIndex => Ok(elements),
    }
}
