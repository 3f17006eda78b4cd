use std::path::PathBuf;

use sinklog::{Level, logger_config};

fn main() {
    let path = PathBuf::from("/tmp/sinklog_threads.log");
    std::fs::remove_file(&path).ok();
    std::fs::remove_file(sinklog::position_path(&path)).ok();

    let guard = logger_config()
        .with_level(Level::Info)
        .with_log_file(&path, Level::Debug)
        .unwrap()
        .init_global();

    log::info!("Hello, world!");
    let handles: Vec<_> = (0..5)
        .map(|i| {
            std::thread::spawn(move || {
                for n in 0..3 {
                    sinklog::debug!("thread {i} message {n}");
                }
                log::warn!("thread {i} done");
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    drop(guard);

    let content = std::fs::read_to_string(&path).unwrap();
    println!("{} lines in {}", content.lines().count(), path.display());
}
