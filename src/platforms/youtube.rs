//! YouTube: videos and playlists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{identity, member_ids, Capture};
use crate::domain::values::{optional_url, required};
use crate::domain::{
    Artifact, ArtifactSchema, AggregateType, Composite, ContentId, DomainResult, Engagement,
    IdFormat, Likeable, MediaUrl, RawEngagement, Tags, ValidationError,
};

/// YouTube video ids are 11 URL-safe characters
const VIDEO_ID: IdFormat = IdFormat::FixedSlug(11);

fn video_id(id: ContentId) -> Result<ContentId, ValidationError> {
    VIDEO_ID.check("videoId", id.as_str())?;
    Ok(id)
}

// ============================================================================
// Video
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVideo {
    pub id: Option<String>,
    pub channel_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub channel_title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub engagement: RawEngagement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAttributes {
    pub title: String,
    pub description: Option<String>,
    pub channel_title: Option<String>,
    pub watch_url: MediaUrl,
    pub thumbnail_url: Option<MediaUrl>,
    pub duration_seconds: Option<u64>,
    pub is_live: bool,
    pub tags: Tags,
    pub published_at: Option<DateTime<Utc>>,
}

impl ArtifactSchema for VideoAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Video;
    const ID_FORMAT: IdFormat = VIDEO_ID;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_live && self.duration_seconds.is_some() {
            return Err(ValidationError::new(
                "durationSeconds",
                "a live stream has no fixed duration",
            ));
        }
        Ok(())
    }

    fn media_urls(&self) -> Vec<&MediaUrl> {
        vec![&self.watch_url]
    }
}

impl Likeable for VideoAttributes {}

pub type Video = Artifact<VideoAttributes>;

impl Capture for Video {
    type Raw = RawVideo;

    fn capture(raw: RawVideo) -> DomainResult<Self> {
        let (id, channel) = identity(raw.id, VIDEO_ID, "channelId", raw.channel_id)?;
        let watch_url = MediaUrl::new(format!("https://www.youtube.com/watch?v={}", id))?;
        let duration_seconds = raw
            .duration_seconds
            .map(|d| {
                u64::try_from(d).map_err(|_| {
                    ValidationError::new("durationSeconds", format!("{} must not be negative", d))
                })
            })
            .transpose()?;

        let attributes = VideoAttributes {
            title: required("title", raw.title)?,
            description: raw.description,
            channel_title: raw.channel_title,
            watch_url,
            thumbnail_url: optional_url("thumbnailUrl", raw.thumbnail_url)?,
            duration_seconds,
            is_live: raw.is_live,
            tags: Tags::new(raw.tags),
            published_at: raw.published_at,
        };
        let engagement = Engagement::from_raw(&raw.engagement)?;

        Artifact::from_parts(id, channel, attributes, engagement)
    }
}

// ============================================================================
// Playlist
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlaylist {
    pub id: Option<String>,
    pub channel_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub video_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistAttributes {
    pub title: String,
    pub description: Option<String>,
    pub is_private: bool,
}

impl ArtifactSchema for PlaylistAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Playlist;
    const ID_FORMAT: IdFormat = IdFormat::Slug;
}

/// Ordered list of videos
pub type Playlist = Composite<PlaylistAttributes>;

impl Capture for Playlist {
    type Raw = RawPlaylist;

    fn capture(raw: RawPlaylist) -> DomainResult<Self> {
        let (id, channel) = identity(raw.id, IdFormat::Slug, "channelId", raw.channel_id)?;
        let attributes = PlaylistAttributes {
            title: required("title", raw.title)?,
            description: raw.description,
            is_private: raw.is_private,
        };
        let videos = member_ids("videoIds", raw.video_ids, VIDEO_ID)?;

        Composite::from_parts(id, channel, attributes, videos)
    }
}

impl Playlist {
    pub fn video_ids(&self) -> &[ContentId] {
        self.member_ids()
    }

    pub fn add_video(&mut self, video: ContentId) -> DomainResult<bool> {
        self.add_member(video_id(video)?)
    }

    pub fn remove_video(&mut self, video: &ContentId) -> DomainResult<()> {
        self.remove_member(video)
    }

    /// Replace the playlist contents with a full snapshot
    pub fn sync_videos(&mut self, videos: Vec<ContentId>) -> DomainResult<()> {
        let videos = videos
            .into_iter()
            .map(video_id)
            .collect::<Result<Vec<_>, _>>()?;
        self.sync_members(videos)
    }

    pub fn reorder_videos(&mut self, order: Vec<ContentId>) -> DomainResult<()> {
        self.reorder_members(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Aggregate, DomainError};

    fn ids(raw: &[&str]) -> Vec<ContentId> {
        raw.iter().map(|s| ContentId::new(*s).unwrap()).collect()
    }

    fn playlist(videos: &[&str]) -> Playlist {
        let mut playlist = Playlist::capture(RawPlaylist {
            id: Some("PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf".to_string()),
            channel_id: Some("UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string()),
            title: Some("Talks".to_string()),
            description: None,
            is_private: false,
            video_ids: videos.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap();
        playlist.pull_domain_events();
        playlist
    }

    #[test]
    fn test_video_id_format() {
        let raw = |id: &str| RawVideo {
            id: Some(id.to_string()),
            channel_id: Some("UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string()),
            title: Some("Intro".to_string()),
            ..Default::default()
        };

        let video = Video::capture(raw("dQw4w9WgXcQ")).unwrap();
        assert_eq!(
            video.attributes().watch_url.as_str(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(Video::capture(raw("too-short")).unwrap_err().field(), Some("id"));
    }

    #[test]
    fn test_live_video_has_no_duration() {
        let err = Video::capture(RawVideo {
            id: Some("dQw4w9WgXcQ".to_string()),
            channel_id: Some("chan".to_string()),
            title: Some("Live".to_string()),
            is_live: true,
            duration_seconds: Some(60),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.field(), Some("durationSeconds"));
    }

    #[test]
    fn test_sync_videos_replaces() {
        let mut playlist = playlist(&["dQw4w9WgXcQ", "9bZkp7q19f0"]);
        playlist.sync_videos(ids(&["kJQP7kiw5Fk"])).unwrap();

        assert_eq!(playlist.video_ids(), ids(&["kJQP7kiw5Fk"]).as_slice());
        let events = playlist.pull_domain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_kind(), "playlist.synced");
    }

    #[test]
    fn test_sync_videos_validates_all_before_changing() {
        let mut playlist = playlist(&["dQw4w9WgXcQ"]);
        let err = playlist
            .sync_videos(ids(&["kJQP7kiw5Fk", "bad"]))
            .unwrap_err();

        assert_eq!(err.field(), Some("videoId"));
        assert_eq!(playlist.video_ids(), ids(&["dQw4w9WgXcQ"]).as_slice());
        assert!(playlist.pull_domain_events().is_empty());
    }

    #[test]
    fn test_reorder_and_remove() {
        let mut playlist = playlist(&["dQw4w9WgXcQ", "9bZkp7q19f0"]);
        playlist
            .reorder_videos(ids(&["9bZkp7q19f0", "dQw4w9WgXcQ"]))
            .unwrap();
        assert_eq!(playlist.video_ids()[0].as_str(), "9bZkp7q19f0");

        let err = playlist.remove_video(&ContentId::new("kJQP7kiw5Fk").unwrap()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn test_playlist_download_lifecycle() {
        let mut playlist = playlist(&["dQw4w9WgXcQ"]);
        playlist.request_download().unwrap();
        playlist.mark_as_downloaded("/media/playlists/talks").unwrap();
        assert!(playlist.is_downloaded());
        assert!(playlist.mark_as_downloaded("/again").is_err());
    }
}
