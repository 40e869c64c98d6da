use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    /// A structural anchor the rule depends on is absent. No fallback
    /// location is ever guessed.
    #[error("rule '{rule}': malformed target: {reason}")]
    MalformedTarget { rule: String, reason: String },

    #[error("rule '{rule}': invalid rule: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("rule '{rule}': {source}")]
    Edit {
        rule: String,
        #[source]
        source: crate::edit::EditError,
    },
}
