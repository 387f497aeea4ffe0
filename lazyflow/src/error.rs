//! Error types and result definitions for sequence operations.
//!
//! Every failure that can surface while pulling from a sequence, feeding a
//! [`crate::concurrency::feed::FeedableSequence`], or running a parallel
//! worker is represented by [`SeqError`]. Errors carry an [`ErrorKind`]
//! classification, a static description, optional dynamic detail, an
//! optional originating error, and the callsite at which they were created.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for sequence operations using [`SeqError`] as the error type.
pub type SeqResult<T> = Result<T, SeqError>;

/// Detailed payload stored for [`SeqError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for sequence operations.
///
/// [`SeqError`] is cheap to clone: the originating error and the backtrace are
/// shared, which allows one failure to be delivered to several consumers (for
/// example every output of a multiplexed sequence).
#[derive(Debug, Clone)]
pub struct SeqError {
    payload: Box<ErrorPayload>,
}

/// Categories of errors that can occur while producing or consuming sequences.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Element-level failures
    OperationFailed,
    SourceFailed,
    AssertionFailed,

    // Protocol violations
    FeedClosed,
    ConsumerAlreadyAttached,
    InvalidArgument,
    EmptySequence,
    MultipleElements,
    DuplicateGroupKey,

    // Worker failures
    WorkerPanic,

    // Unknown / Uncategorized
    Unknown,
}

impl ErrorKind {
    /// Returns `true` if the kind describes misuse of an API rather than a
    /// failure of the data being processed.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ErrorKind::FeedClosed
                | ErrorKind::ConsumerAlreadyAttached
                | ErrorKind::InvalidArgument
                | ErrorKind::EmptySequence
                | ErrorKind::MultipleElements
                | ErrorKind::DuplicateGroupKey
        )
    }
}

impl SeqError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// The stored source is preserved across clones and exposed via [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Wraps an arbitrary caller error as an [`ErrorKind::OperationFailed`] error.
    ///
    /// This is the usual way for step functions passed to combinators to report
    /// their own failures.
    #[track_caller]
    pub fn operation<E>(source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = source.to_string();
        SeqError::from_components(
            ErrorKind::OperationFailed,
            Cow::Borrowed("Operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(source)),
        )
    }

    /// Creates a [`SeqError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SeqError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for SeqError {
    fn eq(&self, other: &SeqError) -> bool {
        self.payload.kind == other.payload.kind
            && self.payload.description == other.payload.description
            && self.payload.detail == other.payload.detail
    }
}

impl Hash for SeqError {
    /// Hashes the error using only its stable identifying components.
    ///
    /// Location, detail, source and backtrace are excluded so that errors of
    /// the same category produce the same hash.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.payload.kind.hash(state);
        self.payload.description.hash(state);
    }
}

impl fmt::Display for SeqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let payload = &self.payload;
        let location = payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            payload.kind,
            payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        write_detail(payload.detail.as_deref(), f, 1)?;
        write_backtrace(payload.backtrace.as_ref(), f, 1)?;

        Ok(())
    }
}

impl error::Error for SeqError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Writes the captured backtrace with indentation.
fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    let indent_str = "  ".repeat(indent);

    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() {
        write!(f, "\n{indent_str}Backtrace:")?;
        for line in rendered_backtrace.lines() {
            if line.trim().is_empty() {
                write!(f, "\n{indent_str}  ")?;
            } else {
                write!(f, "\n{indent_str}  {line}")?;
            }
        }
    }

    Ok(())
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        if detail.trim().is_empty() {
            write!(f, "\n{indent_str}Detail: <empty>")?;
        } else {
            write!(f, "\n{indent_str}Detail:")?;
            for line in detail.lines() {
                if line.trim().is_empty() {
                    write!(f, "\n{indent_str}  ")?;
                } else {
                    write!(f, "\n{indent_str}  {line}")?;
                }
            }
        }
    }

    Ok(())
}

/// Creates a [`SeqError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SeqError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SeqError {
        SeqError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SeqError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SeqError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SeqError {
        SeqError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`SeqError`] with [`ErrorKind::SourceFailed`].
impl From<std::io::Error> for SeqError {
    #[track_caller]
    fn from(err: std::io::Error) -> SeqError {
        let detail = err.to_string();
        SeqError::from_components(
            ErrorKind::SourceFailed,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`tokio::task::JoinError`] to [`SeqError`] with [`ErrorKind::WorkerPanic`].
impl From<tokio::task::JoinError> for SeqError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> SeqError {
        let detail = err.to_string();
        SeqError::from_components(
            ErrorKind::WorkerPanic,
            Cow::Borrowed("Worker task failed to complete"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
