//! Account profiles: platform users and licensing artists.

use serde::{Deserialize, Serialize};

use super::{identity, Capture};
use crate::domain::values::{bounded_text, counter, optional_url, required};
use crate::domain::{
    Artifact, ArtifactSchema, AggregateType, DomainResult, Engagement, Followable, IdFormat,
    MediaUrl, Tags, ValidationError,
};

const MAX_BIO_CHARS: usize = 150;

/// Platform a profile lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Instagram,
    Pinterest,
    Twitter,
    Unsplash,
    Youtube,
}

/// Follower / following / post counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
}

impl ProfileStats {
    pub fn from_raw(
        followers: Option<i64>,
        following: Option<i64>,
        posts: Option<i64>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            followers: counter("followers", followers)?,
            following: counter("following", following)?,
            posts: counter("posts", posts)?,
        })
    }
}

// ============================================================================
// User
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    pub id: Option<String>,
    pub platform: Platform,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_private: bool,
    pub followers: Option<i64>,
    pub following: Option<i64>,
    pub posts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAttributes {
    pub platform: Platform,
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<MediaUrl>,
    pub is_verified: bool,
    pub stats: ProfileStats,
}

impl ArtifactSchema for UserAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::User;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.username.chars().any(char::is_whitespace) {
            return Err(ValidationError::new("username", "must not contain whitespace"));
        }
        if let Some(bio) = &self.bio {
            bounded_text("bio", bio, MAX_BIO_CHARS)?;
        }
        Ok(())
    }

    fn media_urls(&self) -> Vec<&MediaUrl> {
        self.avatar_url.iter().collect()
    }
}

impl Followable for UserAttributes {}

/// Account on a social platform; the "owner" is the account itself
pub type User = Artifact<UserAttributes>;

impl Capture for User {
    type Raw = RawUser;

    fn capture(raw: RawUser) -> DomainResult<Self> {
        let username = required("username", raw.username)?;
        let owner = raw.id.clone();
        let (id, owner) = identity(raw.id, IdFormat::Any, "id", owner)?;

        let attributes = UserAttributes {
            platform: raw.platform,
            username: username.trim_start_matches('@').to_string(),
            full_name: raw.full_name,
            bio: raw.bio,
            avatar_url: optional_url("avatarUrl", raw.avatar_url)?,
            is_verified: raw.is_verified,
            stats: ProfileStats::from_raw(raw.followers, raw.following, raw.posts)?,
        };

        let mut user = Artifact::from_parts(id, owner, attributes, Engagement::default())?;
        if raw.is_private {
            user.make_private();
        }
        Ok(user)
    }
}

impl User {
    pub fn username(&self) -> &str {
        &self.attributes().username
    }

    pub fn stats(&self) -> &ProfileStats {
        &self.attributes().stats
    }

    /// Overwrite profile counts from a fresh scrape; records no event
    pub fn update_stats(&mut self, stats: ProfileStats) {
        let mut attributes = self.attributes().clone();
        attributes.stats = stats;
        self.replace_attributes(attributes);
    }
}

// ============================================================================
// Artist
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArtist {
    pub id: Option<String>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub portfolio_url: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub accepts_commissions: bool,
    pub followers: Option<i64>,
    pub following: Option<i64>,
    pub works: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistAttributes {
    pub name: String,
    pub bio: Option<String>,
    pub portfolio_url: Option<MediaUrl>,
    pub avatar_url: Option<MediaUrl>,
    pub location: Option<String>,
    pub specialties: Tags,
    pub accepts_commissions: bool,
    pub stats: ProfileStats,
}

impl ArtifactSchema for ArtistAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Artist;
    const ID_FORMAT: IdFormat = IdFormat::Slug;

    fn media_urls(&self) -> Vec<&MediaUrl> {
        self.avatar_url.iter().collect()
    }
}

impl Followable for ArtistAttributes {}

/// Creator whose work is offered under licenses
pub type Artist = Artifact<ArtistAttributes>;

impl Capture for Artist {
    type Raw = RawArtist;

    fn capture(raw: RawArtist) -> DomainResult<Self> {
        let owner = raw.id.clone();
        let (id, owner) = identity(raw.id, IdFormat::Slug, "id", owner)?;

        let attributes = ArtistAttributes {
            name: required("name", raw.name)?,
            bio: raw.bio,
            portfolio_url: optional_url("portfolioUrl", raw.portfolio_url)?,
            avatar_url: optional_url("avatarUrl", raw.avatar_url)?,
            location: raw.location,
            specialties: Tags::new(raw.specialties),
            accepts_commissions: raw.accepts_commissions,
            stats: ProfileStats::from_raw(raw.followers, raw.following, raw.works)?,
        };

        Artifact::from_parts(id, owner, attributes, Engagement::default())
    }
}

impl Artist {
    pub fn name(&self) -> &str {
        &self.attributes().name
    }

    /// Overwrite profile counts from a fresh scrape; records no event
    pub fn update_stats(&mut self, stats: ProfileStats) {
        let mut attributes = self.attributes().clone();
        attributes.stats = stats;
        self.replace_attributes(attributes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Aggregate, DomainError};

    fn user() -> User {
        let mut user = User::capture(RawUser {
            id: Some("17841400000".to_string()),
            platform: Platform::Instagram,
            username: Some("@natgeo".to_string()),
            full_name: Some("National Geographic".to_string()),
            bio: None,
            avatar_url: None,
            is_verified: true,
            is_private: false,
            followers: Some(280_000_000),
            following: Some(150),
            posts: Some(30_000),
        })
        .unwrap();
        user.pull_domain_events();
        user
    }

    #[test]
    fn test_username_normalized() {
        assert_eq!(user().username(), "natgeo");
    }

    #[test]
    fn test_follow_twice_fails() {
        let mut user = user();
        user.follow().unwrap();

        let err = user.follow().unwrap_err();
        match err {
            DomainError::InvalidState { reason, .. } => assert_eq!(reason, "already followed"),
            other => panic!("unexpected error: {other:?}"),
        }

        let events = user.pull_domain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_kind(), "user.followed");
    }

    #[test]
    fn test_unfollow_is_silent_and_reversible() {
        let mut user = user();
        user.follow().unwrap();
        user.unfollow().unwrap();
        assert!(!user.is_followed());
        assert!(user.unfollow().is_err());

        user.follow().unwrap();
        assert_eq!(user.pull_domain_events().len(), 2);
    }

    #[test]
    fn test_visibility_toggles_record_nothing() {
        let mut user = user();
        user.make_private();
        assert!(user.is_private());
        user.make_public();
        assert!(!user.is_private());
        assert!(user.pull_domain_events().is_empty());
    }

    #[test]
    fn test_update_stats_is_silent() {
        let mut user = user();
        user.update_stats(ProfileStats {
            followers: 1,
            following: 2,
            posts: 3,
        });
        assert_eq!(user.stats().followers, 1);
        assert!(user.pull_domain_events().is_empty());
    }

    #[test]
    fn test_private_profile_capture() {
        let user = User::capture_json(serde_json::json!({
            "id": "42",
            "platform": "twitter",
            "username": "someone",
            "isPrivate": true
        }))
        .unwrap();
        assert!(user.is_private());
    }

    #[test]
    fn test_artist_requires_name() {
        let err = Artist::capture(RawArtist {
            id: Some("jane-doe".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn test_negative_followers_rejected() {
        let err = Artist::capture(RawArtist {
            id: Some("jane-doe".to_string()),
            name: Some("Jane Doe".to_string()),
            followers: Some(-5),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.field(), Some("followers"));
    }
}
