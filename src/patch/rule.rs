use crate::patch::errors::PatchError;
use std::borrow::Cow;
use std::fmt;

pub(crate) fn is_env_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One guarded edit against one kind of target file.
///
/// Rules are static descriptions; nothing about them is persisted. The guard
/// lives inside each [`Transform`] so that re-applying a rule to its own
/// output is always a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRule {
    pub id: Cow<'static, str>,
    pub transform: Transform,
    /// Evaluated against the file as loaded, before any rule in the same
    /// mutator call has touched it.
    pub precondition: Option<Condition>,
}

impl PatchRule {
    pub fn new(id: impl Into<Cow<'static, str>>, transform: Transform) -> Self {
        Self {
            id: id.into(),
            transform,
            precondition: None,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.precondition = Some(condition);
        self
    }

    /// Reject rules whose guard could not recognise their own output.
    pub fn validate(&self) -> Result<(), PatchError> {
        let invalid = |reason: String| PatchError::InvalidRule {
            rule: self.id.to_string(),
            reason,
        };

        match &self.transform {
            Transform::ReplaceKey { key, value }
            | Transform::ReplaceKeyIfDifferent { key, value } => {
                if !is_env_key(key) {
                    return Err(invalid(format!("'{key}' is not an env key")));
                }
                if value.contains('\n') || value.contains('\r') {
                    return Err(invalid(format!("value for {key} spans lines")));
                }
            }
            Transform::AppendBlock { marker, block } => {
                let present = match marker {
                    Marker::Key(key) => {
                        if !is_env_key(key) {
                            return Err(invalid(format!("'{key}' is not an env key")));
                        }
                        block
                            .lines()
                            .any(|l| l.trim_start().starts_with(&format!("{key}=")))
                    }
                    Marker::Substring(s) => !s.is_empty() && block.contains(s.as_str()),
                };
                if !present {
                    return Err(invalid(format!("block does not contain marker {marker}")));
                }
            }
            Transform::InsertAfterAnchor {
                identifier, line, ..
            }
            | Transform::InsertBeforeClosing {
                identifier, line, ..
            } => {
                if identifier.is_empty() || !line.contains(identifier.as_str()) {
                    return Err(invalid(format!(
                        "inserted line does not contain identifier '{identifier}'"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn replace_key(
        id: impl Into<Cow<'static, str>>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            Transform::ReplaceKey {
                key: key.into(),
                value: value.into(),
            },
        )
    }

    pub fn replace_key_if_different(
        id: impl Into<Cow<'static, str>>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            Transform::ReplaceKeyIfDifferent {
                key: key.into(),
                value: value.into(),
            },
        )
    }

    pub fn append_block(
        id: impl Into<Cow<'static, str>>,
        marker: Marker,
        block: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            Transform::AppendBlock {
                marker,
                block: block.into(),
            },
        )
    }

    pub fn insert_after_line(
        id: impl Into<Cow<'static, str>>,
        anchor: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        let line = line.into();
        Self::new(
            id,
            Transform::InsertAfterAnchor {
                anchor: Anchor::Line(anchor.into()),
                identifier: line.trim().to_string(),
                line,
            },
        )
    }

    pub fn insert_before_closing(
        id: impl Into<Cow<'static, str>>,
        opening: impl Into<String>,
        closing: impl Into<String>,
        identifier: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            Transform::InsertBeforeClosing {
                opening: opening.into(),
                closing: closing.into(),
                identifier: identifier.into(),
                line: line.into(),
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Rewrite the `KEY=` line (active or commented) to `KEY=value`.
    ReplaceKey { key: String, value: String },
    /// Like `ReplaceKey`, but leave the line alone when its parsed value
    /// already equals `value`.
    ReplaceKeyIfDifferent { key: String, value: String },
    /// Append `block` at end of text unless `marker` is already present.
    AppendBlock { marker: Marker, block: String },
    /// Insert `line` right after `anchor` unless `identifier` is present.
    InsertAfterAnchor {
        anchor: Anchor,
        identifier: String,
        line: String,
    },
    /// Insert `line` as a new element just before the last `closing` that
    /// follows `opening`, unless `identifier` is present.
    InsertBeforeClosing {
        opening: String,
        closing: String,
        identifier: String,
        line: String,
    },
}

impl Transform {
    pub fn kind(&self) -> &'static str {
        match self {
            Transform::ReplaceKey { .. } => "replace-key",
            Transform::ReplaceKeyIfDifferent { .. } => "replace-key-if-different",
            Transform::AppendBlock { .. } => "append-block",
            Transform::InsertAfterAnchor { .. } => "insert-after-anchor",
            Transform::InsertBeforeClosing { .. } => "insert-before-closing",
        }
    }
}

/// What an append looks for to decide it already ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// An env-style key, matched as `^#?\s*KEY=` on any line.
    Key(String),
    /// A plain substring anywhere in the text.
    Substring(String),
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Key(key) => write!(f, "key {key}"),
            Marker::Substring(s) => write!(f, "'{s}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// First line whose trimmed content equals the string (e.g. `<?php`).
    Line(String),
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Line(line) => write!(f, "line '{line}'"),
        }
    }
}

/// File-shape precondition for a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Some line, trimmed, equals the string.
    LineEquals(String),
    Contains(String),
}

impl Condition {
    pub fn holds(&self, text: &str) -> bool {
        match self {
            Condition::LineEquals(expected) => text.lines().any(|l| l.trim() == expected),
            Condition::Contains(needle) => text.contains(needle.as_str()),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::LineEquals(line) => write!(f, "line '{line}'"),
            Condition::Contains(needle) => write!(f, "text containing '{needle}'"),
        }
    }
}
