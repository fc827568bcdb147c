use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use pkgsnap_core::PkgSnapError;

/// Where `dump` writes its snapshot.
pub(crate) enum OutputSink {
    Stdout(io::Stdout),
    File {
        path: PathBuf,
        writer: BufWriter<File>,
    },
}

impl OutputSink {
    pub(crate) fn create(path: Option<&Path>) -> Result<Self, PkgSnapError> {
        let Some(path) = path else {
            return Ok(Self::Stdout(io::stdout()));
        };
        let file = File::create(path).map_err(|err| {
            PkgSnapError::io(
                format!("failed to open {} for writing", path.display()),
                err,
            )
        })?;
        Ok(Self::File {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Flushes, syncs a file to disk and closes it. Any failure is fatal.
    pub(crate) fn finish(self) -> Result<(), PkgSnapError> {
        match self {
            Self::Stdout(mut stdout) => stdout
                .flush()
                .map_err(|err| PkgSnapError::io("failed to flush standard output", err)),
            Self::File { path, writer } => {
                let file = writer.into_inner().map_err(|err| {
                    PkgSnapError::io(
                        format!("failed to flush {}", path.display()),
                        err.into_error(),
                    )
                })?;
                file.sync_all().map_err(|err| {
                    PkgSnapError::io(format!("failed to sync {}", path.display()), err)
                })?;
                // std reports no error on close; sync_all above is the last fallible step.
                drop(file);
                Ok(())
            }
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(stdout) => stdout.write(buf),
            Self::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(stdout) => stdout.flush(),
            Self::File { writer, .. } => writer.flush(),
        }
    }
}
