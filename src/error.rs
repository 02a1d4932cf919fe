use std::fmt;
use std::io;

/// Every fallible driver operation returns one of these; the shell maps
/// them to one-line messages and keeps the session alive.
#[derive(Debug)]
pub enum FatError {
    /// The boot sector could not be read, or does not describe a volume
    /// this driver can use.
    VolumeOpen(&'static str),
    /// Read/write failure on the backing image (or on a get/put byte
    /// sink/source). Fatal to the operation in progress, never retried.
    Io(io::Error),
    /// No free cluster left for an allocation. Partial reservations have
    /// already been rolled back when this is returned.
    NoFreeSpace,
    /// The fixed FAT12/16 root directory has no free slot run and cannot
    /// grow.
    RootDirFull,
    /// An entry with the same name already exists in the target
    /// directory, or no numeric tail produces a unique short name.
    FilenameExists,
    /// Path or file lookup miss. Nothing was modified.
    NotFound,
    /// Refusing to delete `.` or `..`.
    DeleteSpecialDir,
    /// FAT stores file sizes in 32 bits; the local file does not fit.
    FileTooLarge,
}

impl fmt::Display for FatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatError::VolumeOpen(why) => write!(f, "cannot open volume: {why}"),
            FatError::Io(e) => write!(f, "disk I/O error: {e}"),
            FatError::NoFreeSpace => write!(f, "no free space left on volume"),
            FatError::RootDirFull => write!(f, "root directory is full"),
            FatError::FilenameExists => write!(f, "filename already exists"),
            FatError::NotFound => write!(f, "no such file or directory"),
            FatError::DeleteSpecialDir => write!(f, "cannot delete . or .."),
            FatError::FileTooLarge => write!(f, "file too large for a FAT volume"),
        }
    }
}

impl std::error::Error for FatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FatError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FatError {
    fn from(e: io::Error) -> Self {
        FatError::Io(e)
    }
}
