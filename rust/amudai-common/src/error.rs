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

    pub fn out_of_range(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::OutOfRange {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn null_argument(name: impl Into<String>) -> Error {
        Error(ErrorKind::NullArgument { name: name.into() }.into())
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

    pub fn array_type_mismatch(expected: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::ArrayTypeMismatch {
                expected: expected.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn disposed(object: impl Into<String>) -> Error {
        Error(
            ErrorKind::Disposed {
                object: object.into(),
            }
            .into(),
        )
    }

    pub fn allocation_failed(size: usize) -> Error {
        Error(ErrorKind::AllocationFailed { size }.into())
    }

    /// Returns `true` if this is an [`ErrorKind::OutOfRange`] error.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind(), ErrorKind::OutOfRange { .. })
    }

    /// Returns `true` if this is an [`ErrorKind::InvalidOperation`] error.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidOperation { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("{name} is out of range: {message}")]
    OutOfRange { name: String, message: String },

    #[error("required argument {name} is missing")]
    NullArgument { name: String },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("array type mismatch, expected {expected}: {message}")]
    ArrayTypeMismatch { expected: String, message: String },

    #[error("cannot access a disposed object: {object}")]
    Disposed { object: String },

    #[error("failed to allocate {size} bytes")]
    AllocationFailed { size: usize },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
