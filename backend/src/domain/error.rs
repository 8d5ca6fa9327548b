//! The error every engine operation returns.
//!
//! Port failures are folded into an [`Error`] at the service boundary.
//! Callers branch on [`ErrorCode`] and may read `details` for the specific
//! precondition that failed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure category, serialised in snake case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// The referenced course, lesson, badge, or record does not exist.
    NotFound,
    /// The engine was invoked out of sequence (for example, recomputing
    /// progress for a student who is not enrolled).
    PreconditionFailed,
    /// A backing store is temporarily unreachable.
    ServiceUnavailable,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

/// Domain error payload.
///
/// The message is never blank; both constructors and deserialisation enforce
/// it.
///
/// # Examples
/// ```
/// use lms_backend::domain::{Error, ErrorCode};
///
/// let err = Error::new(ErrorCode::NotFound, "missing");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase", try_from = "UncheckedError")]
#[error("{message}")]
pub struct Error {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Rejections raised by [`Error::try_new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    #[error("error message must not be empty")]
    EmptyMessage,
}

/// Wire shape accepted before the message is validated.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UncheckedError {
    code: ErrorCode,
    message: String,
    details: Option<Value>,
}

impl TryFrom<UncheckedError> for Error {
    type Error = ErrorValidationError;

    fn try_from(raw: UncheckedError) -> Result<Self, Self::Error> {
        let error = Self::try_new(raw.code, raw.message)?;
        Ok(match raw.details {
            Some(details) => error.with_details(details),
            None => error,
        })
    }
}

macro_rules! code_constructors {
    ($($name:ident => $code:ident),+ $(,)?) => {
        $(
            #[doc = concat!("Shorthand for [`ErrorCode::", stringify!($code), "`].")]
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ErrorCode::$code, message)
            }
        )+
    };
}

impl Error {
    /// Build an error, panicking when `message` is blank.
    ///
    /// # Panics
    /// Panics if the trimmed message is empty. Use [`Error::try_new`] for
    /// caller-supplied text.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::try_new(code, message)
            .unwrap_or_else(|err| panic!("error messages must satisfy validation: {err}"))
    }

    /// Build an error, rejecting a blank message.
    pub fn try_new(
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            details: None,
        })
    }

    code_constructors! {
        invalid_request => InvalidRequest,
        not_found => NotFound,
        precondition_failed => PreconditionFailed,
        service_unavailable => ServiceUnavailable,
        internal => InternalError,
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured context, such as `{"code": "enrollment_missing"}`.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details, replacing any already present.
    ///
    /// # Examples
    /// ```
    /// use lms_backend::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::precondition_failed("not enrolled")
    ///     .with_details(json!({ "code": "enrollment_missing" }));
    /// assert_eq!(err.details(), Some(&json!({ "code": "enrollment_missing" })));
    /// ```
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
