use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, from_document, serde_helpers::chrono_datetime_as_bson_datetime, Bson};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::mongodb::{Coll, Id};

/// Lowest allowed score.
pub const MIN_SCORE: i32 = 1;
/// Highest allowed score.
pub const MAX_SCORE: i32 = 5;

/// One citizen's rating of one leader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingCore {
    pub leader_id: Id,
    pub user_id: Id,
    pub score: i32,
    pub comment: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// A rating without an ID.
pub type NewRating = RatingCore;

/// A rating from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub rating: RatingCore,
}

impl Deref for Rating {
    type Target = RatingCore;

    fn deref(&self) -> &Self::Target {
        &self.rating
    }
}

impl DerefMut for Rating {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.rating
    }
}

/// Average score and number of ratings for one leader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    #[serde(rename = "_id")]
    pub leader_id: Id,
    pub average: f64,
    pub count: u64,
}

impl RatingSummary {
    /// Summarise the ratings of each of the given leaders.
    /// Leaders without ratings are absent from the result.
    pub async fn for_leaders(
        ratings: &Coll<Rating>,
        leader_ids: &[Id],
    ) -> Result<HashMap<Id, RatingSummary>> {
        let ids: Vec<Bson> = leader_ids.iter().map(|id| Bson::from(*id)).collect();
        let pipeline = vec![
            doc! { "$match": { "leader_id": { "$in": ids } } },
            doc! {
                "$group": {
                    "_id": "$leader_id",
                    "average": { "$avg": "$score" },
                    "count": { "$sum": 1 },
                }
            },
        ];
        let documents: Vec<_> = ratings.aggregate(pipeline, None).await?.try_collect().await?;
        documents
            .into_iter()
            .map(|document| {
                let summary: RatingSummary =
                    from_document(document).map_err(mongodb::error::Error::from)?;
                Ok((summary.leader_id, summary))
            })
            .collect()
    }
}
