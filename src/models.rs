use mongodb::{
    bson::{doc, DateTime, Document},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A stream filter that rejected a tweet, with whatever it reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedFilter {
    pub filter_name: String,
    pub details: Document,
}

/// A tweet the bot decided not to retweet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotRetweetedTweet {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub created_at: DateTime,
    pub limit_reached: bool,
    pub failed_filters: Vec<FailedFilter>,
}

pub struct NotRetweetedTweetsRepository {
    collection: Collection<NotRetweetedTweet>,
}

impl NotRetweetedTweetsRepository {
    pub fn new(db: &Database, collection_name: &str) -> Self {
        NotRetweetedTweetsRepository {
            collection: db.collection(collection_name),
        }
    }

    #[instrument(skip_all, fields(id = %tweet.id, author_id = %tweet.author_id), err)]
    pub async fn add(&self, tweet: &NotRetweetedTweet) -> Result<(), mongodb::error::Error> {
        self.collection.insert_one(tweet).await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn count_by_author(&self, author_id: &str) -> Result<u64, mongodb::error::Error> {
        self.collection
            .count_documents(doc! { "author_id": author_id })
            .await
    }
}
