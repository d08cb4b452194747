//! SQLite database operations for the archive ingest tool.

use rusqlite::{Connection, Result as SqliteResult};
use std::sync::Mutex;
use yt_archive_types::*;

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn open(path: &str) -> SqliteResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        // channel_id / video_id are soft foreign keys: no FOREIGN KEY
        // clauses, orphans are counted after load instead.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS channels (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                published_at TEXT NOT NULL,
                subscriber_count INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS videos (
                id TEXT PRIMARY KEY,
                channel_id TEXT NOT NULL,
                title TEXT NOT NULL,
                published_at TEXT NOT NULL,
                view_count INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                video_id TEXT NOT NULL,
                text TEXT NOT NULL,
                author_channel_id TEXT,
                author_name TEXT,
                published_at TEXT NOT NULL,
                like_count INTEGER NOT NULL DEFAULT 0,
                reply_count INTEGER NOT NULL DEFAULT 0,
                is_reply INTEGER NOT NULL DEFAULT 0,
                parent_id TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos(channel_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_comments_video ON comments(video_id)",
            [],
        )?;

        Ok(())
    }

    // =====================================================
    // Upsert Operations
    // =====================================================

    // Re-running an ingest replaces rows by primary key instead of
    // duplicating them (last-write-wins).

    pub fn upsert_channel(&self, channel: &Channel) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO channels (id, title, description, published_at, subscriber_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                channel.id,
                channel.title,
                channel.description,
                channel.published_at,
                channel.subscriber_count
            ],
        )?;
        Ok(())
    }

    pub fn upsert_video(&self, video: &Video) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO videos (id, channel_id, title, published_at, view_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                video.id,
                video.channel_id,
                video.title,
                video.published_at,
                video.view_count
            ],
        )?;
        Ok(())
    }

    pub fn upsert_comment(&self, comment: &Comment) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO comments (
                id, video_id, text, author_channel_id, author_name,
                published_at, like_count, reply_count, is_reply, parent_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                comment.id,
                comment.video_id,
                comment.text,
                comment.author_channel_id,
                comment.author_name,
                comment.published_at,
                comment.like_count,
                comment.reply_count,
                comment.is_reply(),
                comment.parent_id
            ],
        )?;
        Ok(())
    }

    // =====================================================
    // Canned Queries
    // =====================================================

    /// Total comment count for one channel, or None if the channel is
    /// not in the archive. Zero videos or zero comments yields Some(0).
    pub fn comment_count_for_channel(&self, channel_id: &str) -> SqliteResult<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM channels WHERE id = ?1)",
            [channel_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(None);
        }
        let count: i64 = conn.query_row(
            "SELECT COUNT(cm.id)
             FROM channels c
             LEFT JOIN videos v ON v.channel_id = c.id
             LEFT JOIN comments cm ON cm.video_id = v.id
             WHERE c.id = ?1",
            [channel_id],
            |row| row.get(0),
        )?;
        Ok(Some(count))
    }

    /// Comment totals for every channel, descending by count. LEFT JOINs
    /// keep zero-comment channels in the result with a count of 0.
    pub fn comment_counts_per_channel(&self) -> SqliteResult<Vec<ChannelCommentCount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.title, COUNT(cm.id) AS comment_count
             FROM channels c
             LEFT JOIN videos v ON v.channel_id = c.id
             LEFT JOIN comments cm ON cm.video_id = v.id
             GROUP BY c.id, c.title
             ORDER BY comment_count DESC, c.id ASC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(ChannelCommentCount {
                    channel_id: row.get(0)?,
                    title: row.get(1)?,
                    comment_count: row.get(2)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    pub fn table_counts(&self) -> SqliteResult<TableCounts> {
        let conn = self.conn.lock().unwrap();
        let channels: i64 = conn.query_row("SELECT COUNT(*) FROM channels", [], |row| row.get(0))?;
        let videos: i64 = conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?;
        let comments: i64 = conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
        Ok(TableCounts {
            channels,
            videos,
            comments,
        })
    }

    // =====================================================
    // Referential Integrity Checks
    // =====================================================

    pub fn count_orphans(&self) -> SqliteResult<OrphanReport> {
        let conn = self.conn.lock().unwrap();
        let orphan_videos: i64 = conn.query_row(
            "SELECT COUNT(*) FROM videos v
             WHERE NOT EXISTS (SELECT 1 FROM channels c WHERE c.id = v.channel_id)",
            [],
            |row| row.get(0),
        )?;
        let orphan_comments: i64 = conn.query_row(
            "SELECT COUNT(*) FROM comments cm
             WHERE NOT EXISTS (SELECT 1 FROM videos v WHERE v.id = cm.video_id)",
            [],
            |row| row.get(0),
        )?;
        Ok(OrphanReport {
            orphan_videos,
            orphan_comments,
        })
    }

    pub fn get_comment(&self, id: &str) -> SqliteResult<Option<Comment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, video_id, text, author_channel_id, author_name,
                    published_at, like_count, reply_count, parent_id
             FROM comments WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map([id], |row| row_to_comment(row))?;
        Ok(rows.next().and_then(|r| r.ok()))
    }
}

// =====================================================
// Row Mapping Functions
// =====================================================

fn row_to_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        video_id: row.get(1)?,
        text: row.get(2)?,
        author_channel_id: row.get(3)?,
        author_name: row.get(4)?,
        published_at: row.get(5)?,
        like_count: row.get(6)?,
        reply_count: row.get(7)?,
        parent_id: row.get(8)?,
    })
}
