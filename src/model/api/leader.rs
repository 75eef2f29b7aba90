use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    db::{
        leader::{Leader, NewLeader},
        rating::{Rating, RatingSummary, MAX_SCORE, MIN_SCORE},
    },
};

/// Longest comment allowed on a rating.
pub const MAX_COMMENT_LENGTH: usize = 1000;

/// A leader specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderSpec {
    pub name: String,
    pub party: String,
    pub position: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub constituency: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl LeaderSpec {
    /// Convert this spec into a new, active leader.
    pub fn into_leader(self, now: DateTime<Utc>) -> Result<NewLeader> {
        for (field, value) in [
            ("name", &self.name),
            ("party", &self.party),
            ("position", &self.position),
        ] {
            if value.trim().is_empty() {
                return Err(Error::bad_request(format!("Leader {field} must not be blank")));
            }
        }
        Ok(NewLeader {
            name: self.name.trim().to_string(),
            party: self.party.trim().to_string(),
            position: self.position.trim().to_string(),
            state: self.state,
            constituency: self.constituency,
            bio: self.bio,
            image_url: self.image_url,
            is_active: true,
            created_at: now,
        })
    }
}

/// An API-friendly leader description with its rating summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderDescription {
    pub id: ApiId,
    pub name: String,
    pub party: String,
    pub position: String,
    pub state: Option<String>,
    pub constituency: Option<String>,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    /// Mean score, absent until someone rates the leader.
    pub average_rating: Option<f64>,
    pub rating_count: u64,
}

impl LeaderDescription {
    pub fn new(leader: Leader, summary: Option<&RatingSummary>) -> Self {
        Self {
            id: leader.id.into(),
            name: leader.leader.name,
            party: leader.leader.party,
            position: leader.leader.position,
            state: leader.leader.state,
            constituency: leader.leader.constituency,
            bio: leader.leader.bio,
            image_url: leader.leader.image_url,
            is_active: leader.leader.is_active,
            average_rating: summary.map(|s| s.average),
            rating_count: summary.map_or(0, |s| s.count),
        }
    }
}

/// A citizen's score for a leader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSpec {
    pub score: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

impl RatingSpec {
    /// Check the score range and comment length; blank comments become absent.
    pub fn validate(self) -> Result<Self> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.score) {
            return Err(Error::bad_request(format!(
                "Score must be between {MIN_SCORE} and {MAX_SCORE}"
            )));
        }
        let comment = self
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if let Some(ref comment) = comment {
            if comment.chars().count() > MAX_COMMENT_LENGTH {
                return Err(Error::bad_request(format!(
                    "Comment must be at most {MAX_COMMENT_LENGTH} characters"
                )));
            }
        }
        Ok(Self {
            score: self.score,
            comment,
        })
    }
}

/// A rating as listed under a leader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDescription {
    pub id: ApiId,
    pub leader_id: ApiId,
    pub user_id: ApiId,
    pub score: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Rating> for RatingDescription {
    fn from(rating: Rating) -> Self {
        Self {
            id: rating.id.into(),
            leader_id: rating.leader_id.into(),
            user_id: rating.user_id.into(),
            score: rating.score,
            comment: rating.rating.comment,
            created_at: rating.rating.created_at,
            updated_at: rating.rating.updated_at,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl LeaderSpec {
        pub fn example() -> Self {
            Self {
                name: "Meera Menon".into(),
                party: "Civic Front".into(),
                position: "Member of Parliament".into(),
                state: Some("Kerala".into()),
                constituency: Some("Thiruvananthapuram".into()),
                bio: Some("Two-term MP focused on public transport.".into()),
                image_url: None,
            }
        }

        pub fn example2() -> Self {
            Self {
                name: "Arjun Naik".into(),
                party: "People's Alliance".into(),
                position: "Member of Legislative Assembly".into(),
                state: Some("Goa".into()),
                constituency: Some("Panaji".into()),
                bio: None,
                image_url: None,
            }
        }
    }

    impl RatingSpec {
        pub fn example(score: i32) -> Self {
            Self {
                score,
                comment: Some("Responsive to constituents".into()),
            }
        }
    }
}
