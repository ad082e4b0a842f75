use std::fmt;
use std::io;
use std::os::raw::c_int;

#[derive(Debug)]
pub enum Error {
    NotFound,
    AccessDenied,
    NotPermitted,
    Exhausted,
    OutOfRange,
    NameTooLong,
    Invalid,
    Corrupted(String),
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn errno(&self) -> c_int {
        match self {
            Error::NotFound => libc::ENOENT,
            Error::AccessDenied => libc::EACCES,
            Error::NotPermitted => libc::EPERM,
            Error::Exhausted => libc::ENOMEM,
            Error::OutOfRange => libc::ENOMEM,
            Error::NameTooLong => libc::ENAMETOOLONG,
            Error::Invalid => libc::EINVAL,
            Error::Corrupted(_) => libc::EINVAL,
            Error::Io(_) => libc::EIO,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => write!(f, "no entry for path"),
            Error::AccessDenied => write!(f, "owner permission bits deny the requested access"),
            Error::NotPermitted => write!(f, "operation not permitted"),
            Error::Exhausted => write!(f, "no free inode slot or data block"),
            Error::OutOfRange => write!(f, "offset or length outside the stored data"),
            Error::NameTooLong => write!(f, "path exceeds the stored path capacity"),
            Error::Invalid => write!(f, "entry has no data block"),
            Error::Corrupted(detail) => write!(f, "backing store is unusable: {}", detail),
            Error::Io(e) => write!(f, "backing store i/o failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}
