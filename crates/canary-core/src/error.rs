use crate::store::StoreError;
use std::borrow::Cow;

/// A `Result` alias where the `Err` case is `canary_core::Error`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A shift request or the identity of the service being shifted is
    /// missing something or out of range. The message names the field.
    #[error("{0}")]
    InvalidRequest(Cow<'static, str>),

    /// Routing state read from a store doesn't hold up.
    #[error("{0}")]
    InvalidState(&'static str),

    /// Remote state is ambiguous or changed underneath an update.
    #[error("{0}")]
    Conflict(Cow<'static, str>),

    /// The routing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub(crate) fn invalid_request(message: &'static str) -> Self {
        Self::InvalidRequest(Cow::Borrowed(message))
    }

    pub(crate) fn conflict(message: &'static str) -> Self {
        Self::Conflict(Cow::Borrowed(message))
    }

    /// Returns `true` if a create failed because the object already exists.
    ///
    /// This is expected when shifting a second build of a service, and callers
    /// should fall back to an update.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::Store(StoreError::AlreadyExists { .. }))
    }

    /// Returns `true` if this error came from ambiguous or concurrently
    /// modified remote state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<canary_api::Error> for Error {
    fn from(err: canary_api::Error) -> Self {
        Error::InvalidRequest(Cow::Owned(err.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_selector_errors_are_invalid_requests() {
        let err: Error = canary_api::labels::parse_selector("app=api,version")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::InvalidRequest(_)), "{err:?}");
        assert_eq!(
            err.to_string(),
            "invalid label pair 'version': expected key=value"
        );

        let err: Error = canary_api::labels::format_selector(&Default::default())
            .unwrap_err()
            .into();
        assert_eq!(err.to_string(), "got an empty labelSelector");
    }

    #[test]
    fn test_already_exists() {
        let err = Error::from(StoreError::AlreadyExists {
            kind: "DestinationRule",
            name: "api".to_string(),
        });
        assert!(err.is_already_exists());
        assert!(!err.is_conflict());
        assert_eq!(err.to_string(), r#"DestinationRule "api" already exists"#);
    }
}
