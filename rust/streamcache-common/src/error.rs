use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn configuration(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Configuration {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn cache_unavailable(path: impl Into<PathBuf>) -> Error {
        Error(ErrorKind::CacheUnavailable { path: path.into() }.into())
    }

    /// Wraps an I/O failure of the active spool.
    ///
    /// If `source` already carries an [`Error`] (for example one that crossed a
    /// `std::io::Read` boundary), the typed error is unwrapped and returned as is.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        match unwrap_typed(source) {
            Ok(e) => e,
            Err(source) => Error(
                ErrorKind::IoUnavailable {
                    context: context.into(),
                    source,
                }
                .into(),
            ),
        }
    }

    /// Recovers a typed error from an `std::io::Error` produced by this crate family.
    pub fn from_io(source: std::io::Error) -> Error {
        Error::io("", source)
    }

    /// Construction-time configuration failure (bad spool directory, bad cipher name).
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration { .. })
    }

    /// Runtime I/O failure while spooling or reading a spool file.
    pub fn is_io(&self) -> bool {
        matches!(self.kind(), ErrorKind::IoUnavailable { .. })
    }

    /// The backing spool file of a stream cache is gone.
    pub fn is_cache_unavailable(&self) -> bool {
        matches!(self.kind(), ErrorKind::CacheUnavailable { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid configuration {name}: {message}")]
    Configuration { name: String, message: String },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("spool I/O unavailable for '{context}': {source}")]
    IoUnavailable {
        context: String,
        source: std::io::Error,
    },

    #[error("stream cache is no longer available, spool file '{}' is gone", path.display())]
    CacheUnavailable { path: PathBuf },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        let kind = match e.kind() {
            ErrorKind::Configuration { .. } | ErrorKind::InvalidArgument { .. } => {
                std::io::ErrorKind::InvalidInput
            }
            ErrorKind::InvalidOperation { .. } => std::io::ErrorKind::Other,
            ErrorKind::IoUnavailable { source, .. } => source.kind(),
            ErrorKind::CacheUnavailable { .. } => std::io::ErrorKind::NotFound,
        };
        std::io::Error::new(kind, e)
    }
}

fn unwrap_typed(e: std::io::Error) -> std::result::Result<Error, std::io::Error> {
    if !e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        return Err(e);
    }
    let kind = e.kind();
    match e.into_inner().map(|inner| inner.downcast::<Error>()) {
        Some(Ok(inner)) => Ok(*inner),
        Some(Err(other)) => Err(std::io::Error::new(kind, other)),
        None => Err(kind.into()),
    }
}
