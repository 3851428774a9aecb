//! Twitter / X: tweets and threads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{identity, member_ids, Capture};
use crate::domain::values::{counter, optional_url, required};
use crate::domain::{
    Archivable, Artifact, ArtifactSchema, AggregateType, Composite, ContentId, DomainResult,
    Engagement, IdFormat, Likeable, MediaUrl, Tags, ValidationError,
};

/// Tweet ids are numeric snowflakes
const TWEET_ID: IdFormat = IdFormat::Numeric;

// ============================================================================
// Tweet
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTweet {
    pub id: Option<String>,
    pub author_id: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub video_url: Option<String>,
    pub conversation_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub quoted_id: Option<String>,
    #[serde(default)]
    pub is_retweet: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub views: Option<i64>,
    pub likes: Option<i64>,
    pub replies: Option<i64>,
    pub retweets: Option<i64>,
    pub bookmarks: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetAttributes {
    pub text: String,
    pub media_urls: Vec<MediaUrl>,
    pub video_url: Option<MediaUrl>,
    pub conversation_id: Option<ContentId>,
    pub in_reply_to: Option<ContentId>,
    pub quoted_id: Option<ContentId>,
    pub is_retweet: bool,
    pub hashtags: Tags,
    pub posted_at: Option<DateTime<Utc>>,
}

impl ArtifactSchema for TweetAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Tweet;
    const ID_FORMAT: IdFormat = TWEET_ID;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() && self.media_urls.is_empty() && self.video_url.is_none() {
            return Err(ValidationError::new("text", "a tweet needs text or media"));
        }
        Ok(())
    }

    fn media_urls(&self) -> Vec<&MediaUrl> {
        self.video_url.iter().chain(self.media_urls.iter()).collect()
    }
}

impl Likeable for TweetAttributes {}
impl Archivable for TweetAttributes {}

pub type Tweet = Artifact<TweetAttributes>;

fn optional_tweet_id(field: &str, raw: Option<String>) -> Result<Option<ContentId>, ValidationError> {
    raw.map(|id| ContentId::with_format(id, TWEET_ID).map_err(|e| e.for_field(field)))
        .transpose()
}

impl Capture for Tweet {
    type Raw = RawTweet;

    fn capture(raw: RawTweet) -> DomainResult<Self> {
        let (id, author) = identity(raw.id, TWEET_ID, "authorId", raw.author_id)?;
        let text = raw.text.unwrap_or_default();
        let media_urls = raw
            .media_urls
            .into_iter()
            .map(|url| MediaUrl::new(url).map_err(|e| e.for_field("mediaUrls")))
            .collect::<Result<Vec<_>, _>>()?;

        let attributes = TweetAttributes {
            hashtags: Tags::from_text(&text),
            text,
            media_urls,
            video_url: optional_url("videoUrl", raw.video_url)?,
            conversation_id: optional_tweet_id("conversationId", raw.conversation_id)?,
            in_reply_to: optional_tweet_id("inReplyTo", raw.in_reply_to)?,
            quoted_id: optional_tweet_id("quotedId", raw.quoted_id)?,
            is_retweet: raw.is_retweet,
            posted_at: raw.posted_at,
        };
        // platform vocabulary: replies -> comments, retweets -> shares, bookmarks -> saves
        let engagement = Engagement {
            views: counter("views", raw.views)?,
            likes: counter("likes", raw.likes)?,
            comments: counter("replies", raw.replies)?,
            shares: counter("retweets", raw.retweets)?,
            saves: counter("bookmarks", raw.bookmarks)?,
        };

        Artifact::from_parts(id, author, attributes, engagement)
    }
}

impl Tweet {
    pub fn is_reply(&self) -> bool {
        self.attributes().in_reply_to.is_some()
    }
}

// ============================================================================
// Thread
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawThread {
    /// Conversation id of the thread
    pub id: Option<String>,
    pub author_id: Option<String>,
    pub root_tweet_id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub tweet_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadAttributes {
    pub root_tweet_id: ContentId,
    pub title: Option<String>,
}

impl ArtifactSchema for ThreadAttributes {
    const AGGREGATE_TYPE: AggregateType = AggregateType::Thread;
    const ID_FORMAT: IdFormat = TWEET_ID;

    fn validate(&self) -> Result<(), ValidationError> {
        TWEET_ID.check("rootTweetId", self.root_tweet_id.as_str())
    }
}

impl Archivable for ThreadAttributes {}

/// An author's chain of tweets, kept in reading order
pub type Thread = Composite<ThreadAttributes>;

impl Capture for Thread {
    type Raw = RawThread;

    fn capture(raw: RawThread) -> DomainResult<Self> {
        let (id, author) = identity(raw.id, TWEET_ID, "authorId", raw.author_id)?;
        let root = ContentId::with_format(required("rootTweetId", raw.root_tweet_id)?, TWEET_ID)
            .map_err(|e| e.for_field("rootTweetId"))?;

        let mut tweets = member_ids("tweetIds", raw.tweet_ids, TWEET_ID)?;
        if tweets.is_empty() {
            tweets.push(root.clone());
        } else if tweets[0] != root {
            return Err(ValidationError::new("tweetIds", "must start with the root tweet").into());
        }

        let attributes = ThreadAttributes {
            root_tweet_id: root,
            title: raw.title,
        };
        Composite::from_parts(id, author, attributes, tweets)
    }
}

impl Thread {
    pub fn tweet_ids(&self) -> &[ContentId] {
        self.member_ids()
    }

    pub fn root_tweet_id(&self) -> &ContentId {
        &self.attributes().root_tweet_id
    }

    /// Append a tweet. Fails if archived or if the tweet is already in the thread.
    pub fn add_tweet(&mut self, tweet: ContentId) -> DomainResult<()> {
        TWEET_ID.check("tweetId", tweet.as_str())?;
        self.add_member_strict(tweet)
    }

    /// Drop a tweet; the root cannot be removed
    pub fn remove_tweet(&mut self, tweet: &ContentId) -> DomainResult<()> {
        if tweet == self.root_tweet_id() {
            return Err(self.artifact().reject("cannot remove the root tweet"));
        }
        self.remove_member(tweet)
    }

    /// Must be an exact permutation of the current tweets
    pub fn reorder_tweets(&mut self, order: Vec<ContentId>) -> DomainResult<()> {
        self.reorder_members(order)
    }
}
