//! Ingestion run orchestration: stage sequencing, CSV discovery,
//! referential integrity validation, and the run summary.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use yt_archive_types::{LoadOutcome, RunSummary, StageReport};

use crate::db::Db;
use crate::loader;

/// CSV subdirectories under the data root, one per entity kind.
pub const CHANNELS_DIR: &str = "channels";
pub const VIDEOS_DIR: &str = "videos";
pub const COMMENTS_DIR: &str = "comments";

/// Collect the CSV files for one entity kind, sorted by filename.
///
/// Accepts either a directory of `*.csv` files or a single file path.
pub fn discover_csv_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("no such file or directory: {}", path.display());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file() && p.extension().map(|ext| ext == "csv").unwrap_or(false)
        })
        .collect();
    files.sort();
    if files.is_empty() {
        bail!("no CSV files found in {}", path.display());
    }
    Ok(files)
}

fn run_stage(
    kind: &str,
    source: &Path,
    load_file: impl Fn(&Path) -> Result<LoadOutcome>,
) -> StageReport {
    let files = match discover_csv_files(source) {
        Ok(files) => files,
        Err(err) => {
            log::error!("{} stage failed: {:#}", kind, err);
            return StageReport::Failed {
                message: format!("{:#}", err),
            };
        }
    };

    let mut outcome = LoadOutcome::default();
    for file in &files {
        match load_file(file) {
            Ok(file_outcome) => outcome.merge(file_outcome),
            Err(err) => {
                // A database write failure mid-file is still a stage
                // failure; rows already inserted stay in place.
                log::error!("{} stage failed on {}: {:#}", kind, file.display(), err);
                return StageReport::Failed {
                    message: format!("{:#}", err),
                };
            }
        }
    }

    log::info!(
        "{}: inserted {} rows, skipped {} ({} file(s))",
        kind,
        outcome.inserted,
        outcome.skipped.len(),
        files.len()
    );
    StageReport::Completed {
        inserted: outcome.inserted,
        skipped: outcome.skipped.len() as u64,
    }
}

/// Run a full ingestion pass: channels, then videos, then comments,
/// then orphan validation. A failed stage is recorded and the run
/// continues with the remaining kinds.
pub fn run(db: &Db, data_dir: &Path) -> Result<RunSummary> {
    let started_at = chrono::Utc::now().to_rfc3339();

    let channels = run_stage("channels", &data_dir.join(CHANNELS_DIR), |path| {
        loader::load_channels_file(db, path)
    });
    let videos = run_stage("videos", &data_dir.join(VIDEOS_DIR), |path| {
        loader::load_videos_file(db, path)
    });
    let comments = run_stage("comments", &data_dir.join(COMMENTS_DIR), |path| {
        loader::load_comments_file(db, path)
    });

    let orphans = db.count_orphans().context("orphan validation failed")?;
    if orphans.orphan_videos > 0 {
        log::warn!("{} video(s) reference an unknown channel", orphans.orphan_videos);
    }
    if orphans.orphan_comments > 0 {
        log::warn!("{} comment(s) reference an unknown video", orphans.orphan_comments);
    }

    let table_counts = db.table_counts().context("failed to count tables")?;

    let mut summary = RunSummary {
        started_at,
        finished_at: chrono::Utc::now().to_rfc3339(),
        channels,
        videos,
        comments,
        orphans,
        table_counts,
        warning_count: 0,
    };
    summary.compute_warning_count();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    /// Build a small dataset: 2 channels, 3 videos
    /// (2 under C1, 1 under C2), 5 comments (3 on C1's videos, 2 on C2's).
    fn seed_data_dir(root: &Path) {
        let channels = root.join(CHANNELS_DIR);
        let videos = root.join(VIDEOS_DIR);
        let comments = root.join(COMMENTS_DIR);
        std::fs::create_dir_all(&channels).unwrap();
        std::fs::create_dir_all(&videos).unwrap();
        std::fs::create_dir_all(&comments).unwrap();

        write_file(
            &channels,
            "channels.csv",
            "id,title,description,published_at,subscriber_count\n\
             C1,Title A,,2020-01-01T00:00:00Z,100\n\
             C2,Title B,,2020-02-01T00:00:00Z,200\n",
        );
        write_file(
            &videos,
            "videos.csv",
            "id,channel_id,title,published_at,view_count\n\
             v1,C1,first,2020-03-01T00:00:00Z,10\n\
             v2,C1,second,2020-03-02T00:00:00Z,20\n\
             v3,C2,third,2020-03-03T00:00:00Z,30\n",
        );
        write_file(
            &comments,
            "comments.csv",
            "id,video_id,text,published_at\n\
             cm1,v1,a,2020-04-01T00:00:00Z\n\
             cm2,v1,b,2020-04-02T00:00:00Z\n\
             cm3,v2,c,2020-04-03T00:00:00Z\n\
             cm4,v3,d,2020-04-04T00:00:00Z\n\
             cm5,v3,e,2020-04-05T00:00:00Z\n",
        );
    }

    #[test]
    fn test_full_run_matches_csv_row_counts() {
        let dir = tempfile::tempdir().unwrap();
        seed_data_dir(dir.path());
        let db = Db::open(":memory:").unwrap();

        let summary = run(&db, dir.path()).unwrap();
        assert_eq!(summary.table_counts.channels, 2);
        assert_eq!(summary.table_counts.videos, 3);
        assert_eq!(summary.table_counts.comments, 5);
        assert_eq!(summary.warning_count, 0);
        assert_eq!(summary.orphans.orphan_videos, 0);
        assert_eq!(summary.orphans.orphan_comments, 0);

        // Per-channel leaderboard: (C1, 3), (C2, 2) descending
        let per_channel = db.comment_counts_per_channel().unwrap();
        assert_eq!(per_channel[0].channel_id, "C1");
        assert_eq!(per_channel[0].comment_count, 3);
        assert_eq!(per_channel[1].channel_id, "C2");
        assert_eq!(per_channel[1].comment_count, 2);
    }

    #[test]
    fn test_rerun_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        seed_data_dir(dir.path());
        let db = Db::open(":memory:").unwrap();

        run(&db, dir.path()).unwrap();
        let summary = run(&db, dir.path()).unwrap();
        // Upsert-by-primary-key: counts are unchanged on the second pass
        assert_eq!(summary.table_counts.channels, 2);
        assert_eq!(summary.table_counts.videos, 3);
        assert_eq!(summary.table_counts.comments, 5);
    }

    #[test]
    fn test_missing_kind_fails_stage_but_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        seed_data_dir(dir.path());
        std::fs::remove_dir_all(dir.path().join(VIDEOS_DIR)).unwrap();
        let db = Db::open(":memory:").unwrap();

        let summary = run(&db, dir.path()).unwrap();
        assert!(summary.videos.is_failed());
        assert!(!summary.channels.is_failed());
        assert!(!summary.comments.is_failed());
        // Comments loaded anyway; with no videos they are all orphans
        assert_eq!(summary.table_counts.comments, 5);
        assert_eq!(summary.orphans.orphan_comments, 5);
        // 1 failed stage + 5 orphaned comments
        assert_eq!(summary.warning_count, 6);
    }

    #[test]
    fn test_skipped_rows_counted_in_summary() {
        let dir = tempfile::tempdir().unwrap();
        seed_data_dir(dir.path());
        // Append a comment row with no id
        let path = dir.path().join(COMMENTS_DIR).join("extra.csv");
        write_file(
            &dir.path().join(COMMENTS_DIR),
            "extra.csv",
            "id,video_id,text,published_at\n\
             ,v1,orphan text,2020-05-01T00:00:00Z\n\
             cm6,v1,fine,2020-05-02T00:00:00Z\n",
        );
        assert!(path.is_file());
        let db = Db::open(":memory:").unwrap();

        let summary = run(&db, dir.path()).unwrap();
        assert_eq!(summary.comments.skipped_rows(), 1);
        assert_eq!(summary.table_counts.comments, 6);
        assert_eq!(summary.warning_count, 1);
    }

    #[test]
    fn test_discover_accepts_single_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "one.csv", "id,title,published_at\n");
        let file = dir.path().join("one.csv");
        let found = discover_csv_files(&file).unwrap();
        assert_eq!(found, vec![file]);
    }

    #[test]
    fn test_discover_sorts_and_filters_csv() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "b.csv", "");
        write_file(dir.path(), "a.csv", "");
        write_file(dir.path(), "notes.txt", "");
        let found = discover_csv_files(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_discover_missing_path_errors() {
        assert!(discover_csv_files(Path::new("/nonexistent/dir")).is_err());
    }
}
