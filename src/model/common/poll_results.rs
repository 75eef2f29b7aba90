//! Poll result aggregation.
//!
//! Everything here works on data that has already been fetched; nothing
//! touches the database.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use rocket::FromFormField;
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::audience::Viewer,
    db::{poll::Poll, response::PollResponse},
    mongodb::Id,
};

/// Bucket used when a respondent's attribute is not known.
pub const UNKNOWN: &str = "Unknown";

/// Aggregated results for a whole poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    pub poll_id: ApiId,
    pub title: String,
    /// Number of distinct respondents.
    pub total_responses: usize,
    pub questions: Vec<QuestionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Breakdown>,
}

impl PollResult {
    /// True iff nobody has answered the poll yet.
    pub fn is_empty(&self) -> bool {
        self.total_responses == 0
    }

    /// Attach a demographic breakdown of the respondents.
    pub fn with_breakdown(mut self, breakdown: Breakdown) -> Self {
        self.breakdown = Some(breakdown);
        self
    }
}

/// Aggregated results for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: ApiId,
    pub text: String,
    pub total_votes: u64,
    /// Options in the order the poll lists them.
    pub options: Vec<OptionResult>,
    /// The most voted option, ties going to the first listed.
    /// `None` while the question has no votes.
    pub winner: Option<ApiId>,
}

/// Vote count for a single option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionResult {
    pub option_id: ApiId,
    pub text: String,
    pub votes: u64,
    /// Share of the question's votes, 0 to 100.
    pub percentage: f64,
}

/// Respondent attributes that results can be broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "snake_case")]
pub enum Demographic {
    Gender,
    State,
    Constituency,
    #[field(value = "age_group")]
    AgeGroup,
}

impl Demographic {
    /// The bucket a viewer falls into for this attribute.
    fn bucket(self, viewer: &Viewer, today: NaiveDate) -> String {
        let value = match self {
            Self::Gender => viewer.gender.clone(),
            Self::State => viewer.state.clone(),
            Self::Constituency => viewer.constituency.clone(),
            Self::AgeGroup => viewer.age_on(today).map(|age| age_group(age).to_string()),
        };
        value
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

/// Respondent counts grouped by one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub by: Demographic,
    pub groups: Vec<DemographicCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicCount {
    pub value: String,
    pub respondents: usize,
    /// Share of all respondents, 0 to 100.
    pub percentage: f64,
}

/// Age bracket label for reporting.
pub fn age_group(age: u32) -> &'static str {
    match age {
        0..=17 => "Under 18",
        18..=24 => "18-24",
        25..=34 => "25-34",
        35..=44 => "35-44",
        45..=54 => "45-54",
        55..=64 => "55-64",
        _ => "65+",
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// The responses that count towards a poll's results: those for this poll
/// whose option belongs to the question answered.
fn counted<'a>(
    poll: &'a Poll,
    responses: &'a [PollResponse],
) -> impl Iterator<Item = &'a PollResponse> {
    responses.iter().filter(move |response| {
        response.poll_id == poll.id
            && poll
                .question(response.question_id)
                .map_or(false, |q| q.option(response.option_id).is_some())
    })
}

/// Tally the responses to a poll.
///
/// Responses for other polls, unknown questions, or options that do not
/// belong to their question are ignored.
pub fn aggregate(poll: &Poll, responses: &[PollResponse]) -> PollResult {
    let mut votes: HashMap<(Id, Id), u64> = HashMap::new();
    let mut respondents: HashSet<Id> = HashSet::new();

    for response in counted(poll, responses) {
        *votes
            .entry((response.question_id, response.option_id))
            .or_default() += 1;
        respondents.insert(response.user_id);
    }

    let questions = poll
        .questions
        .iter()
        .map(|question| {
            let counts: Vec<u64> = question
                .options
                .iter()
                .map(|option| {
                    votes
                        .get(&(question.id, option.id))
                        .copied()
                        .unwrap_or(0)
                })
                .collect();
            let total_votes: u64 = counts.iter().sum();

            // Strictly greater keeps the earliest option on ties.
            let mut winner: Option<(usize, u64)> = None;
            for (i, &count) in counts.iter().enumerate() {
                if count > 0 && winner.map_or(true, |(_, best)| count > best) {
                    winner = Some((i, count));
                }
            }

            QuestionResult {
                question_id: question.id.into(),
                text: question.text.clone(),
                total_votes,
                options: question
                    .options
                    .iter()
                    .zip(&counts)
                    .map(|(option, &count)| OptionResult {
                        option_id: option.id.into(),
                        text: option.text.clone(),
                        votes: count,
                        percentage: percentage(count, total_votes),
                    })
                    .collect(),
                winner: winner.map(|(i, _)| question.options[i].id.into()),
            }
        })
        .collect();

    PollResult {
        poll_id: poll.id.into(),
        title: poll.title.clone(),
        total_responses: respondents.len(),
        questions,
        breakdown: None,
    }
}

/// Group the distinct respondents of a poll by a demographic attribute.
///
/// Each respondent is counted once however many questions they answered,
/// and only responses that [`aggregate`] counts are considered, so the
/// groups add up to its `total_responses`.
/// Respondents missing from `profiles` land in the [`UNKNOWN`] bucket.
/// Groups are ordered by size, largest first, then by name.
pub fn breakdown(
    poll: &Poll,
    responses: &[PollResponse],
    profiles: &HashMap<Id, Viewer>,
    by: Demographic,
    today: NaiveDate,
) -> Breakdown {
    let respondents: HashSet<Id> = counted(poll, responses).map(|r| r.user_id).collect();
    let total = respondents.len() as u64;

    let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
    for respondent in &respondents {
        let bucket = profiles
            .get(respondent)
            .map(|viewer| by.bucket(viewer, today))
            .unwrap_or_else(|| UNKNOWN.to_string());
        *buckets.entry(bucket).or_default() += 1;
    }

    let mut groups: Vec<DemographicCount> = buckets
        .into_iter()
        .map(|(value, respondents)| DemographicCount {
            value,
            respondents,
            percentage: percentage(respondents as u64, total),
        })
        .collect();
    // Stable sort keeps the BTreeMap's name order among equal counts.
    groups.sort_by(|a, b| b.respondents.cmp(&a.respondents));

    Breakdown { by, groups }
}
