use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use url::Url;

use crate::error::Error;

/// Where a document is read from or written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Path(PathBuf),
    FileUrl(Url),
}

impl Location {
    /// Accepts a filesystem path or a `file:` URL. Anything else, including
    /// other URL schemes, is rejected.
    pub fn parse(input: &str) -> Result<Self, Error> {
        if input.trim().is_empty() {
            return Err(Error::InvalidLocation(input.to_string()));
        }
        match Url::parse(input) {
            Ok(url) if url.scheme() == "file" => Ok(Location::FileUrl(url)),
            // A single-letter scheme is a Windows drive, not a URL.
            Ok(url) if url.scheme().len() > 1 => Err(Error::InvalidLocation(input.to_string())),
            _ => Ok(Location::Path(PathBuf::from(input))),
        }
    }

    pub fn to_path(&self) -> Result<PathBuf, Error> {
        match self {
            Location::Path(path) => Ok(path.clone()),
            Location::FileUrl(url) => url
                .to_file_path()
                .map_err(|()| Error::InvalidLocation(url.to_string())),
        }
    }

    pub fn read(&self) -> Result<Vec<u8>, Error> {
        Ok(std::fs::read(self.to_path()?)?)
    }

    pub fn write(&self, bytes: &[u8]) -> Result<(), Error> {
        Ok(std::fs::write(self.to_path()?, bytes)?)
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse(s)
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::Path(path)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Location::Path(path.to_path_buf())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(path) => write!(f, "{}", path.display()),
            Location::FileUrl(url) => write!(f, "{url}"),
        }
    }
}
