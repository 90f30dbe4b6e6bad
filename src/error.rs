//! Error taxonomy for the drive adapter.
//!
//! Every public operation reports failure through `DriveError`. Hosts that
//! speak POSIX can map a failure to a condition code with [`DriveError::errno`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriveError {
    /// Operation needs folder semantics on a non-folder.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Operation is unsupported for the item's current mime type.
    #[error("not implemented for {0}")]
    NotImplemented(String),

    /// No exportable or downloadable representation exists.
    #[error("no data available for {0}")]
    NoData(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// Synthetic directories can never be mutated.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Operation is not implemented yet for this item type, e.g. mutating
    /// an item the service listed without a remote id.
    #[error("not supported yet: {0}")]
    NotSupported(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("need to authenticate as {0} first")]
    NotAuthenticated(String),

    /// The translated metadata carries no usable mime type.
    #[error("could not determine mime type for {0}")]
    InvalidMime(String),

    /// The remote service answered with a non-success status.
    #[error("remote request failed ({status}): {body}")]
    Remote { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl DriveError {
    /// POSIX condition code for this failure.
    pub fn errno(&self) -> i32 {
        match self {
            DriveError::NotADirectory(_) => libc::ENOTDIR,
            DriveError::NotImplemented(_) => libc::ENOSYS,
            DriveError::NoData(_) => libc::ENODATA,
            DriveError::AlreadyExists(_) => libc::EEXIST,
            DriveError::NotEmpty(_) => libc::ENOTEMPTY,
            DriveError::PermissionDenied(_) => libc::EPERM,
            DriveError::NotSupported(_) => libc::ENOTSUP,
            DriveError::NotFound(_) => libc::ENOENT,
            DriveError::NotAuthenticated(_) => libc::EACCES,
            DriveError::Remote { status: 404, .. } => libc::ENOENT,
            DriveError::Remote { status: 401 | 403, .. } => libc::EACCES,
            DriveError::InvalidMime(_)
            | DriveError::Remote { .. }
            | DriveError::Transport(_)
            | DriveError::Parse(_) => libc::EIO,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DriveError::NotFound(_) | DriveError::Remote { status: 404, .. }
        )
    }
}

impl From<reqwest::Error> for DriveError {
    fn from(err: reqwest::Error) -> Self {
        DriveError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(DriveError::NotEmpty("d".into()).errno(), libc::ENOTEMPTY);
        assert_eq!(DriveError::PermissionDenied("t".into()).errno(), libc::EPERM);
        assert_eq!(DriveError::NotADirectory("f".into()).errno(), libc::ENOTDIR);
        assert_eq!(DriveError::NotImplemented("f".into()).errno(), libc::ENOSYS);
        assert_eq!(DriveError::NoData("f".into()).errno(), libc::ENODATA);
        assert_eq!(DriveError::AlreadyExists("f".into()).errno(), libc::EEXIST);
        assert_eq!(DriveError::Transport("dns error".into()).errno(), libc::EIO);
    }

    #[test]
    fn test_remote_status_mapping() {
        let missing = DriveError::Remote { status: 404, body: String::new() };
        assert_eq!(missing.errno(), libc::ENOENT);
        assert!(missing.is_not_found());

        let denied = DriveError::Remote { status: 403, body: String::new() };
        assert_eq!(denied.errno(), libc::EACCES);
        assert!(!denied.is_not_found());
    }
}
