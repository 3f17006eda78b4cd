use std::sync::Arc;

use sinklog::{Level, ThreadLock, logger_config};

fn main() {
    let path = std::env::temp_dir().join("sinklog_ring.log");

    let guard = logger_config()
        .with_lock(Arc::new(ThreadLock::new()))
        .with_level(Level::Trace)
        .with_file_limit(512)
        .with_log_file(&path, Level::Trace)
        .unwrap()
        .init_global();

    sinklog::trace!("This is a log");
    sinklog::debug!("This is a log");
    sinklog::info!("This is a log");
    sinklog::warn!("This is a log");
    sinklog::error!("This is a log");
    sinklog::fatal!("This is a log");

    drop(guard);

    let size = std::fs::metadata(&path).unwrap().len();
    let offset = sinklog::read_position(&sinklog::position_path(&path)).unwrap_or_default();
    println!("\n--- Ring file ---");
    println!("Log file: {} ({size} bytes, limit 512)", path.display());
    println!("Next run resumes at offset {offset}");
}
