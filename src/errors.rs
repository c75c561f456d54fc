use thiserror::Error;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The submitted job title is blank after normalization.
    #[error("Title must not be empty")]
    EmptyTitle,

    /// The submitted job title exceeds the stored column width.
    #[error("Title must not exceed {max} characters")]
    TitleTooLong { max: usize, length: usize },

    /// The locale is not one of the supported tags.
    #[error("Unsupported locale {0:?}")]
    UnsupportedLocale(String),

    /// The listing sort order is not recognized.
    #[error("Unsupported sort order {0:?}")]
    InvalidSortOrder(String),

    /// The external classifier could not be reached, timed out, or
    /// answered with an error status.
    #[error("Classification unavailable")]
    ClassificationUnavailable { reason: String },

    /// The external classifier answered, but not with the expected
    /// structured payload.
    #[error("Invalid classifier response")]
    InvalidClassifierResponse { raw: String, reason: String },

    /// The uniqueness constraint on (profession, locale) rejected an
    /// insert. Only ever seen inside the store.
    #[error("Analysis already exists")]
    DuplicateKey,

    /// Represents an SQL error.
    #[error("SQLx error")]
    Sqlx { source: sqlx::Error },

    /// The store could not be reached or is otherwise unusable.
    #[error("Store unavailable")]
    StoreUnavailable,

    /// A component could not be built from its configuration.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

impl BackendError {
    /// Whether the error was caused by the caller's input rather than
    /// by anything downstream.
    pub fn is_client_error(&self) -> bool {
        use BackendError::*;

        matches!(
            self,
            EmptyTitle | TitleTooLong { .. } | UnsupportedLocale(..) | InvalidSortOrder(..)
        )
    }
}
