use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{lock::LockError, registry::SlotId};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by registration, teardown and lock handling.
///
/// None of these are fatal: the logger keeps running with fewer sinks or a
/// lost offset, and the dispatcher only ever turns them into diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    /// The sink table is at capacity.
    #[error("sink registry is full ({capacity} slots)")]
    RegistryFull { capacity: usize },
    /// The log file could neither be opened for update nor created.
    #[error("can't open log file {}: {source}", path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The sidecar position record could not be written on close.
    #[error("can't persist position to {}: {source}", path.display())]
    PositionPersist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write to sink {slot} failed: {source}")]
    SinkWrite {
        slot: SlotId,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("unknown log level {0:?}")]
    InvalidLevel(String),
}
