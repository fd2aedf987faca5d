use std::path::PathBuf;

/// error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a repository (or any parent up to filesystem root): {0}")]
    NoRepo(PathBuf),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("malformed object: {0}")]
    MalformedObject(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("ambiguous object reference: {0}")]
    AmbiguousReference(String),

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("invalid ref name: {0}")]
    InvalidRef(String),

    #[error("cyclic symbolic ref: {0}")]
    RefCycle(String),

    #[error("user identity not configured (set user.name and user.email)")]
    MissingIdentity,

    #[error("{0}")]
    EmptyCommit(String),

    #[error("lock already held: {0} exists")]
    LockHeld(PathBuf),

    #[error("path is outside the repository: {0}")]
    PathOutsideRepo(PathBuf),

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("duplicate tree entry name: {0}")]
    DuplicateEntryName(String),

    #[error("invalid object type: {0}")]
    InvalidObjectType(String),

    #[error("invalid object id hex: {0}")]
    InvalidHashHex(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
