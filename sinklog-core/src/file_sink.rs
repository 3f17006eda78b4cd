use std::{
    fs::File,
    io::{self, BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    event::Event,
    format::format_file,
    position::{position_path, read_position, write_position},
};

/// A bounded log file that wraps to offset 0 once past its byte limit.
///
/// Wrapping never shortens the file: bytes left over from a longer cycle stay
/// on disk until overwritten, so the size settles at the limit plus one line.
pub struct FileSink {
    file: BufWriter<File>,
    path: PathBuf,
    position_path: PathBuf,
}

impl FileSink {
    /// Opens `path` for update, creating it when missing, and positions the
    /// stream where the last [`persist_position`](Self::persist_position) left it.
    ///
    /// Without a usable position record writing starts after existing content
    /// instead of at offset 0, so an existing log is never overwritten from
    /// the top on open. The record, when present, is clamped to the file length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = open_for_update(&path).map_err(|source| Error::SinkOpen {
            path: path.clone(),
            source,
        })?;
        let position_path = position_path(&path);
        let len = file
            .metadata()
            .map_err(|source| Error::SinkOpen {
                path: path.clone(),
                source,
            })?
            .len();
        let start = match read_position(&position_path) {
            Some(offset) => SeekFrom::Start(offset.min(len)),
            None => SeekFrom::End(0),
        };
        file.seek(start).map_err(|source| Error::SinkOpen {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            file: BufWriter::new(file),
            path,
            position_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn position_path(&self) -> &Path {
        &self.position_path
    }

    pub fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    pub fn write_event(&mut self, event: &Event<'_>) -> io::Result<()> {
        let mut event = *event;
        if event.byte_limit > 0 && self.file.stream_position()? > u64::from(event.byte_limit) {
            self.file.seek(SeekFrom::Start(0))?;
        }
        writeln!(self.file, "{}", format_file(&mut event))?;
        self.file.flush()
    }

    /// Closes the log file and records where writing stopped.
    pub fn persist_position(self) -> Result<u64> {
        let Self {
            mut file,
            position_path,
            ..
        } = self;
        let offset = file
            .stream_position()
            .map_err(|source| Error::PositionPersist {
                path: position_path.clone(),
                source,
            })?;
        drop(file);
        write_position(&position_path, offset).map_err(|source| Error::PositionPersist {
            path: position_path,
            source,
        })?;
        Ok(offset)
    }
}

fn open_for_update(path: &Path) -> io::Result<File> {
    File::options()
        .read(true)
        .write(true)
        .open(path)
        .or_else(|_| {
            File::options()
                .create(true)
                .truncate(true)
                .write(true)
                .open(path)
        })
}
