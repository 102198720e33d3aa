use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tweet {
    pub id: Uuid,
    pub text: String,
    pub created_at: i64,
    pub author_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Like {
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub created_at: i64,
}

/// Author fields projected onto each feed row at query time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub image: Option<String>,
}

/// A tweet as rendered in the feed: the row itself plus the read-side
/// author projection and like aggregates.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FeedTweet {
    pub id: Uuid,
    pub text: String,
    pub created_at: i64,
    pub author: Author,
    pub like_count: i64,
    pub liked: bool,
}

/// One page of the feed. `next_cursor` is present iff a full page was
/// returned; its absence is the end-of-feed signal.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FeedPage {
    pub tweets: Vec<FeedTweet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Uuid>,
}
