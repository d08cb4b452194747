//! YouTube CSV Archive Ingest — batch loader for channel/video/comment
//! CSV exports into a SQLite archive, plus canned aggregate queries.
//!
//! Usage: yt-archive-ingest [DATA_DIR] [DB_PATH]
//! Defaults: ./data and ./yt_archive.db

mod db;
mod ingest;
mod loader;

use std::path::PathBuf;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let data_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data"));
    let db_path = args.next().unwrap_or_else(|| "./yt_archive.db".to_string());

    log::info!("Opening database at: {}", db_path);
    let database = match db::Db::open(&db_path) {
        Ok(database) => database,
        Err(err) => {
            // Database unavailable is the one fatal error class
            log::error!("Failed to open database {}: {}", db_path, err);
            std::process::exit(1);
        }
    };

    log::info!("Ingesting CSV exports from: {}", data_dir.display());
    let summary = match ingest::run(&database, &data_dir) {
        Ok(summary) => summary,
        Err(err) => {
            log::error!("Ingestion aborted: {:#}", err);
            std::process::exit(1);
        }
    };

    match database.comment_counts_per_channel() {
        Ok(per_channel) => {
            for entry in per_channel {
                log::info!(
                    "channel {} ({}): {} comment(s)",
                    entry.channel_id,
                    entry.title,
                    entry.comment_count
                );
            }
        }
        Err(err) => log::error!("Per-channel query failed: {}", err),
    }

    if summary.warning_count > 0 {
        log::warn!("Run finished with {} warning(s)", summary.warning_count);
    } else {
        log::info!("Run finished cleanly");
    }

    // Machine-readable summary on stdout; logs go to stderr
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(err) => log::error!("Failed to serialize run summary: {}", err),
    }
}
