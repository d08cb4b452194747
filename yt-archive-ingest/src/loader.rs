//! Best-effort CSV loaders, one per entity kind.
//!
//! Malformed rows never abort a file: each failure is collected as a
//! `RowError` and the loader moves on to the next record.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use yt_archive_types::{Channel, Comment, LoadOutcome, RowError, Video};

use crate::db::Db;

// =====================================================
// CSV Record Shapes
// =====================================================

// Required fields are Option here so a missing column becomes a per-row
// validation error with a readable reason instead of a serde message.
// Count columns use u64: negative values fail coercion and skip the row.

#[derive(Debug, Deserialize)]
struct ChannelRecord {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(alias = "publishedAt")]
    published_at: Option<String>,
    #[serde(alias = "subscriberCount", default)]
    subscriber_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct VideoRecord {
    id: Option<String>,
    #[serde(alias = "channelId")]
    channel_id: Option<String>,
    title: Option<String>,
    #[serde(alias = "publishedAt")]
    published_at: Option<String>,
    #[serde(alias = "viewCount", default)]
    view_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CommentRecord {
    id: Option<String>,
    #[serde(alias = "videoId")]
    video_id: Option<String>,
    text: Option<String>,
    #[serde(alias = "authorChannelId", default)]
    author_channel_id: Option<String>,
    #[serde(alias = "authorName", default)]
    author_name: Option<String>,
    #[serde(alias = "publishedAt")]
    published_at: Option<String>,
    #[serde(alias = "likeCount", default)]
    like_count: Option<u64>,
    #[serde(alias = "replyCount", default)]
    reply_count: Option<u64>,
    #[serde(alias = "parentId", default)]
    parent_id: Option<String>,
}

fn require(field: Option<String>, name: &str) -> std::result::Result<String, String> {
    match field {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(format!("missing required column '{}'", name)),
    }
}

// Empty strings in optional columns load as NULL, not ""
fn optional(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

impl TryFrom<ChannelRecord> for Channel {
    type Error = String;

    fn try_from(rec: ChannelRecord) -> std::result::Result<Self, String> {
        Ok(Channel {
            id: require(rec.id, "id")?,
            title: require(rec.title, "title")?,
            description: optional(rec.description),
            published_at: require(rec.published_at, "published_at")?,
            subscriber_count: rec.subscriber_count.unwrap_or(0) as i64,
        })
    }
}

impl TryFrom<VideoRecord> for Video {
    type Error = String;

    fn try_from(rec: VideoRecord) -> std::result::Result<Self, String> {
        Ok(Video {
            id: require(rec.id, "id")?,
            channel_id: require(rec.channel_id, "channel_id")?,
            title: require(rec.title, "title")?,
            published_at: require(rec.published_at, "published_at")?,
            view_count: rec.view_count.unwrap_or(0) as i64,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = String;

    fn try_from(rec: CommentRecord) -> std::result::Result<Self, String> {
        Ok(Comment {
            id: require(rec.id, "id")?,
            video_id: require(rec.video_id, "video_id")?,
            text: require(rec.text, "text")?,
            author_channel_id: optional(rec.author_channel_id),
            author_name: optional(rec.author_name),
            published_at: require(rec.published_at, "published_at")?,
            like_count: rec.like_count.unwrap_or(0) as i64,
            reply_count: rec.reply_count.unwrap_or(0) as i64,
            parent_id: optional(rec.parent_id),
        })
    }
}

// =====================================================
// File Loaders
// =====================================================

pub fn load_channels_file(db: &Db, path: &Path) -> Result<LoadOutcome> {
    load_csv_file::<ChannelRecord, Channel>(path, |c| db.upsert_channel(c))
}

pub fn load_videos_file(db: &Db, path: &Path) -> Result<LoadOutcome> {
    load_csv_file::<VideoRecord, Video>(path, |v| db.upsert_video(v))
}

pub fn load_comments_file(db: &Db, path: &Path) -> Result<LoadOutcome> {
    load_csv_file::<CommentRecord, Comment>(path, |c| db.upsert_comment(c))
}

/// Read one CSV file record-by-record, upserting every well-formed row.
///
/// Returns Err only when the file itself cannot be read or the database
/// rejects a write; malformed rows land in `LoadOutcome.skipped`.
fn load_csv_file<Rec, T>(
    path: &Path,
    mut insert: impl FnMut(&T) -> rusqlite::Result<()>,
) -> Result<LoadOutcome>
where
    Rec: DeserializeOwned,
    Rec: TryInto<T, Error = String>,
{
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header of {}", path.display()))?
        .clone();

    let mut outcome = LoadOutcome::default();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                let line = err
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(outcome.inserted + outcome.skipped.len() as u64 + 1);
                log::warn!("{}: line {}: {}", path.display(), line, err);
                outcome.skipped.push(RowError {
                    line,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let parsed: std::result::Result<T, String> = record
            .deserialize::<Rec>(Some(&headers))
            .map_err(|e| e.to_string())
            .and_then(|rec| rec.try_into());
        match parsed {
            Ok(entity) => {
                insert(&entity)
                    .with_context(|| format!("database write failed at {}:{}", path.display(), line))?;
                outcome.inserted += 1;
            }
            Err(reason) => {
                log::warn!("{}: line {}: skipping row: {}", path.display(), line, reason);
                outcome.skipped.push(RowError { line, reason });
            }
        }
    }
    Ok(outcome)
}
