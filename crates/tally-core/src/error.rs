use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Not a stable API; intended for internal use and may change without notice.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a configuration error (programmer error, fatal at call time).
    pub fn config(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Config, origin, message)
    }

    /// Construct an unsupported-configuration error.
    ///
    /// Distinct from [`ErrorClass::Config`]: callers may opt into skipping
    /// unsupported rules during reconciliation instead of failing.
    pub fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    /// Construct an internal invariant violation.
    pub fn internal(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, origin, message)
    }

    /// Wrap a store-level failure, propagated unmodified in message form.
    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Store, ErrorOrigin::Store, message)
    }

    /// Return whether this error is the catchable unsupported-rule condition.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.class, ErrorClass::Unsupported)
    }
}

///
/// ErrorClass
///
/// Coarse classification used to decide fatality and catchability.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Invalid rule or chain declaration. Fatal, never retried.
    Config,
    /// Valid declaration the reconciler cannot express in bulk SQL.
    Unsupported,
    /// Engine invariant violation.
    Internal,
    /// Failure surfaced by the host store. Propagated without retries.
    Store,
}

///
/// ErrorOrigin
///
/// Subsystem that raised the error.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Registry,
    Resolver,
    Delta,
    Aggregator,
    Join,
    Reconcile,
    Store,
}
