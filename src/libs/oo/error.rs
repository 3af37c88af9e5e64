use thiserror::Error;

/// Fatal conditions. Evidence that merely disagrees is never an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("unknown fragment {name}")]
    UnknownFragment { name: String },

    #[error("unknown clone {name}")]
    UnknownClone { name: String },

    #[error("clone {clone} appears in more than one barge")]
    DuplicateBarge { clone: String },

    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AssemblyError {
    pub fn parse(file: &str, line: usize, message: impl Into<String>) -> Self {
        AssemblyError::Parse {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }
}
