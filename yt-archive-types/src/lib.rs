//! Shared types for the YouTube CSV archive ingest tool.

use serde::{Deserialize, Serialize};

// =====================================================
// Domain Types
// =====================================================

/// A YouTube channel as exported to CSV
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: String,
    pub subscriber_count: i64,
}

/// A video belonging to a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub published_at: String,
    pub view_count: i64,
}

/// A top-level comment or reply on a video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub video_id: String,
    pub text: String,
    pub author_channel_id: Option<String>,
    pub author_name: Option<String>,
    pub published_at: String,
    pub like_count: i64,
    pub reply_count: i64,
    /// Parent comment id when this comment is a reply
    pub parent_id: Option<String>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

// =====================================================
// Load Reporting Types
// =====================================================

/// A single malformed CSV row that was skipped during a load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based line number in the source file (header is line 1)
    pub line: u64,
    pub reason: String,
}

/// Result of loading one CSV file: rows inserted plus rows skipped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub inserted: u64,
    pub skipped: Vec<RowError>,
}

impl LoadOutcome {
    pub fn merge(&mut self, other: LoadOutcome) {
        self.inserted += other.inserted;
        self.skipped.extend(other.skipped);
    }
}

/// Outcome of one ingestion stage (one entity kind)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageReport {
    /// The stage ran; rows may still have been skipped
    Completed { inserted: u64, skipped: u64 },
    /// The stage could not run at all (missing or unreadable source)
    Failed { message: String },
}

impl StageReport {
    pub fn skipped_rows(&self) -> u64 {
        match self {
            StageReport::Completed { skipped, .. } => *skipped,
            StageReport::Failed { .. } => 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageReport::Failed { .. })
    }
}

// =====================================================
// Query Result Types
// =====================================================

/// Per-channel comment total from the canned aggregate query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCommentCount {
    pub channel_id: String,
    pub title: String,
    pub comment_count: i64,
}

/// Row counts of the three archive tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub channels: i64,
    pub videos: i64,
    pub comments: i64,
}

/// Soft-foreign-key rows whose referent is missing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrphanReport {
    /// Videos whose channel_id matches no channel row
    pub orphan_videos: i64,
    /// Comments whose video_id matches no video row
    pub orphan_comments: i64,
}

/// Machine-readable summary of a whole ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub channels: StageReport,
    pub videos: StageReport,
    pub comments: StageReport,
    pub orphans: OrphanReport,
    pub table_counts: TableCounts,
    /// Skipped rows plus orphaned rows plus failed stages
    pub warning_count: u64,
}

impl RunSummary {
    pub fn compute_warning_count(&mut self) {
        let mut warnings = 0u64;
        for stage in [&self.channels, &self.videos, &self.comments] {
            warnings += stage.skipped_rows();
            if stage.is_failed() {
                warnings += 1;
            }
        }
        warnings += self.orphans.orphan_videos as u64;
        warnings += self.orphans.orphan_comments as u64;
        self.warning_count = warnings;
    }
}
