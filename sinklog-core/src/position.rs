//! Sidecar position records: `<log path>.pos` holding one native-endian `isize`.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

const SUFFIX: &str = ".pos";
const RECORD_LEN: usize = size_of::<isize>();

pub fn position_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(SUFFIX);
    PathBuf::from(name)
}

/// Reads a stored offset. Missing, short or negative records read as `None`.
pub fn read_position(path: &Path) -> Option<u64> {
    let bytes = fs::read(path).ok()?;
    let record: [u8; RECORD_LEN] = bytes.get(..RECORD_LEN)?.try_into().ok()?;
    u64::try_from(isize::from_ne_bytes(record)).ok()
}

pub fn write_position(path: &Path, offset: u64) -> io::Result<()> {
    let offset = isize::try_from(offset)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "offset exceeds isize"))?;
    let mut file = File::create(path)?;
    file.write_all(&offset.to_ne_bytes())?;
    file.flush()
}
