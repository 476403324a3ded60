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

    pub fn logical(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::LogicalError {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn illegal_type(type_name: impl Into<String>) -> Error {
        Error(
            ErrorKind::IllegalTypeOfArgument {
                type_name: type_name.into(),
            }
            .into(),
        )
    }

    pub fn arguments_mismatch(expected: usize, actual: usize) -> Error {
        Error(ErrorKind::NumberOfArgumentsDoesntMatch { expected, actual }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("illegal type of argument: {type_name}")]
    IllegalTypeOfArgument { type_name: String },

    #[error("number of arguments doesn't match: expected {expected}, got {actual}")]
    NumberOfArgumentsDoesntMatch { expected: usize, actual: usize },

    #[error("logical error: {message}")]
    LogicalError { message: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
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
