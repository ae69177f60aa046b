//  ERRORS.rs
//    by Ray Plante
//
//  Description:
//!   Defines errors that occur in the `joboffice-cfg` crate.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;


/***** LIBRARY *****/
/// Errors that relate to loading or writing a [`crate::config::JobOfficeConfig`].
#[derive(Debug)]
pub enum Error {
    /// Failed to open the given file.
    FileOpenError { path: PathBuf, err: std::io::Error },
    /// Failed to read the given file's contents.
    FileReadError { path: PathBuf, err: std::io::Error },
    /// Failed to parse the given file as YAML.
    FileParseError { path: PathBuf, err: serde_yaml::Error },
    /// Failed to serialize the config back to YAML.
    ConfigSerializeError { err: serde_yaml::Error },
    /// Failed to create the given file.
    FileCreateError { path: PathBuf, err: std::io::Error },
    /// Failed to write the given file's contents.
    FileWriteError { path: PathBuf, err: std::io::Error },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use Error::*;
        match self {
            FileOpenError { path, err } => write!(f, "failed to open job office config file '{}': {}", path.display(), err),
            FileReadError { path, err } => write!(f, "failed to read job office config file '{}': {}", path.display(), err),
            FileParseError { path, err } => write!(f, "failed to parse job office config file '{}' as YAML: {}", path.display(), err),
            ConfigSerializeError { err } => write!(f, "failed to serialize job office config as YAML: {}", err),
            FileCreateError { path, err } => write!(f, "failed to create job office config file '{}': {}", path.display(), err),
            FileWriteError { path, err } => write!(f, "failed to write job office config file '{}': {}", path.display(), err),
        }
    }
}

impl StdError for Error {}
