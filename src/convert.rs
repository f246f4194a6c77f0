//! DOCX to PDF conversion through a headless LibreOffice process.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use url::Url;
use uuid::Uuid;

use crate::error::Error;

pub trait Converter: Send + Sync {
    fn convert(&self, docx: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Finds the conversion binary.
pub trait BinaryResolver: Send + Sync {
    fn resolve(&self) -> Result<PathBuf, Error>;
}

/// Ordered candidate paths; the first regular file wins.
#[derive(Clone, Debug)]
pub struct Candidates(pub Vec<PathBuf>);

impl BinaryResolver for Candidates {
    fn resolve(&self) -> Result<PathBuf, Error> {
        for path in &self.0 {
            match fs::metadata(path) {
                Ok(meta) if meta.is_file() => {
                    log::debug!("using converter binary {}", path.display());
                    return Ok(path.clone());
                }
                _ => log::debug!("no converter binary at {}", path.display()),
            }
        }
        Err(Error::BinaryNotFound {
            tried: self.0.clone(),
        })
    }
}

/// The well-known LibreOffice install locations for an operating system,
/// as named by `std::env::consts::OS`.
#[derive(Clone, Debug)]
pub struct PlatformResolver {
    os: String,
}

impl PlatformResolver {
    pub fn for_os(os: impl Into<String>) -> Self {
        PlatformResolver { os: os.into() }
    }

    pub fn candidates(&self) -> Result<Candidates, Error> {
        let paths: &[&str] = match self.os.as_str() {
            "linux" => &[
                "/usr/bin/soffice",
                "/usr/bin/libreoffice",
                "/usr/local/bin/soffice",
                "/usr/local/bin/libreoffice",
                "/snap/bin/libreoffice",
                "/opt/libreoffice/program/soffice",
            ],
            "macos" => &["/Applications/LibreOffice.app/Contents/MacOS/soffice"],
            other => return Err(Error::UnsupportedPlatform(other.to_string())),
        };
        Ok(Candidates(paths.iter().map(PathBuf::from).collect()))
    }
}

impl Default for PlatformResolver {
    fn default() -> Self {
        PlatformResolver::for_os(std::env::consts::OS)
    }
}

impl BinaryResolver for PlatformResolver {
    fn resolve(&self) -> Result<PathBuf, Error> {
        self.candidates()?.resolve()
    }
}

pub struct SofficeConverter {
    resolver: Box<dyn BinaryResolver>,
    temp_root: Option<PathBuf>,
}

impl Default for SofficeConverter {
    fn default() -> Self {
        SofficeConverter::new(PlatformResolver::default())
    }
}

impl SofficeConverter {
    pub fn new(resolver: impl BinaryResolver + 'static) -> Self {
        SofficeConverter {
            resolver: Box::new(resolver),
            temp_root: None,
        }
    }

    /// Uses a specific binary instead of searching the install locations.
    pub fn with_binary(bin: impl Into<PathBuf>) -> Self {
        SofficeConverter::new(Candidates(vec![bin.into()]))
    }

    /// Stages files under `root` instead of the system temp directory.
    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    fn stage_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("soffice-");
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

impl Converter for SofficeConverter {
    fn convert(&self, docx: &[u8]) -> Result<Vec<u8>, Error> {
        let bin = self.resolver.resolve()?;

        let workdir = self.stage_dir()?;
        let stem = Uuid::new_v4().to_string();
        let input = workdir.path().join(format!("{stem}.docx"));
        let output = workdir.path().join(format!("{stem}.pdf"));
        fs::write(&input, docx)?;

        run(&bin, workdir.path(), &input)?;

        let pdf = fs::read(&output).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::MissingOutput(output.clone()),
            _ => Error::Io(e),
        })?;

        let removed = [fs::remove_file(&input), fs::remove_file(&output)];
        for result in removed {
            result.map_err(Error::Cleanup)?;
        }
        workdir.close().map_err(Error::Cleanup)?;

        log::info!("converted {} byte document to {} byte PDF", docx.len(), pdf.len());
        Ok(pdf)
    }
}

fn run(bin: &Path, workdir: &Path, input: &Path) -> Result<(), Error> {
    // A private profile keeps parallel runs and a running desktop instance apart.
    let profile = Url::from_directory_path(workdir.join("profile"))
        .map_err(|()| Error::InvalidLocation(workdir.display().to_string()))?;

    log::debug!("running {} on {}", bin.display(), input.display());
    let result = Command::new(bin)
        .arg(format!("-env:UserInstallation={profile}"))
        .args(["--headless", "--convert-to", "pdf", "--outdir"])
        .arg(workdir)
        .arg(input)
        .output()
        .map_err(|source| Error::Spawn {
            bin: bin.to_path_buf(),
            source,
        })?;

    log::debug!("{}: {}", bin.display(), String::from_utf8_lossy(&result.stdout).trim());
    if !result.status.success() {
        return Err(Error::ConversionFailed {
            code: result.status.code(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }
    Ok(())
}
