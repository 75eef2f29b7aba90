use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        id::ApiId,
        target::{normalise_target, validate_target},
    },
    common::audience::TargetFilter,
    db::{
        poll::{NewPoll, Poll, PollOption, Question},
        response::NewPollResponse,
    },
    mongodb::Id,
};

/// Minimum number of options per question.
pub const MIN_OPTIONS: usize = 2;

/// A poll specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub questions: Vec<QuestionSpec>,
    #[serde(default)]
    pub target: Option<TargetFilter>,
    /// Defaults to the moment of creation.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// A question specification: its text and the option texts in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub text: String,
    pub options: Vec<String>,
}

impl PollSpec {
    /// Validate this spec and convert it into an active poll, giving every
    /// question and option a fresh ID.
    pub fn into_poll(self, created_by: Id, now: DateTime<Utc>) -> Result<NewPoll> {
        if self.title.trim().is_empty() {
            return Err(Error::bad_request("Poll title must not be blank"));
        }
        if self.questions.is_empty() {
            return Err(Error::bad_request("Poll must have at least one question"));
        }
        if let Some(ref target) = self.target {
            validate_target(target)?;
        }
        let start_time = self.start_time.unwrap_or(now);
        if matches!(self.end_time, Some(end_time) if end_time <= start_time) {
            return Err(Error::bad_request("Poll must end after it starts"));
        }
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, question)| question.into_question(i + 1))
            .collect::<Result<Vec<_>>>()?;

        Ok(NewPoll {
            title: self.title.trim().to_string(),
            description: self.description,
            questions,
            target: normalise_target(self.target),
            start_time,
            end_time: self.end_time,
            is_active: true,
            created_by,
            created_at: now,
        })
    }
}

impl QuestionSpec {
    /// Convert this spec into a question; `number` is only used in errors.
    fn into_question(self, number: usize) -> Result<Question> {
        if self.text.trim().is_empty() {
            return Err(Error::bad_request(format!("Question {number} has no text")));
        }
        if self.options.len() < MIN_OPTIONS {
            return Err(Error::bad_request(format!(
                "Question {number} needs at least {MIN_OPTIONS} options"
            )));
        }
        if self.options.iter().any(|option| option.trim().is_empty()) {
            return Err(Error::bad_request(format!("Question {number} has a blank option")));
        }
        Ok(Question {
            id: Id::new(),
            text: self.text.trim().to_string(),
            options: self
                .options
                .into_iter()
                .map(|text| PollOption {
                    id: Id::new(),
                    text: text.trim().to_string(),
                })
                .collect(),
        })
    }
}

/// An API-friendly poll description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollDescription {
    pub id: ApiId,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<QuestionDescription>,
    pub target: Option<TargetFilter>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Whether the requesting citizen has already answered; absent for admins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDescription {
    pub id: ApiId,
    pub text: String,
    pub options: Vec<OptionDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDescription {
    pub id: ApiId,
    pub text: String,
}

impl PollDescription {
    /// Mark whether the citizen viewing this poll has answered it.
    pub fn answered(mut self, answered: bool) -> Self {
        self.answered = Some(answered);
        self
    }
}

impl From<Poll> for PollDescription {
    fn from(poll: Poll) -> Self {
        Self {
            id: poll.id.into(),
            title: poll.poll.title,
            description: poll.poll.description,
            questions: poll
                .poll
                .questions
                .into_iter()
                .map(|question| QuestionDescription {
                    id: question.id.into(),
                    text: question.text,
                    options: question
                        .options
                        .into_iter()
                        .map(|option| OptionDescription {
                            id: option.id.into(),
                            text: option.text,
                        })
                        .collect(),
                })
                .collect(),
            target: poll.poll.target,
            start_time: poll.poll.start_time,
            end_time: poll.poll.end_time,
            is_active: poll.poll.is_active,
            created_at: poll.poll.created_at,
            answered: None,
        }
    }
}

/// A citizen's answers to a poll, one per question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSubmission {
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: ApiId,
    pub option_id: ApiId,
}

impl ResponseSubmission {
    /// Check the answers against the poll and turn them into responses.
    ///
    /// Every question must be answered exactly once, with one of its own options.
    pub fn into_responses(
        self,
        poll: &Poll,
        user_id: Id,
        now: DateTime<Utc>,
    ) -> Result<Vec<NewPollResponse>> {
        let mut chosen: HashMap<Id, Id> = HashMap::new();
        for answer in self.answers {
            let question = poll
                .question(*answer.question_id)
                .ok_or_else(|| Error::bad_request(format!("Unknown question {}", answer.question_id)))?;
            if question.option(*answer.option_id).is_none() {
                return Err(Error::bad_request(format!(
                    "Option {} does not belong to question {}",
                    answer.option_id, answer.question_id
                )));
            }
            if chosen.insert(question.id, *answer.option_id).is_some() {
                return Err(Error::bad_request(format!(
                    "Question {} answered more than once",
                    answer.question_id
                )));
            }
        }
        if chosen.len() != poll.questions.len() {
            return Err(Error::bad_request("Every question must be answered"));
        }

        // Keep the poll's question order.
        Ok(poll
            .questions
            .iter()
            .map(|question| NewPollResponse {
                poll_id: poll.id,
                user_id,
                question_id: question.id,
                option_id: chosen[&question.id],
                created_at: now,
            })
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn poll() -> Poll {
        Poll {
            id: Id::new(),
            poll: PollSpec::example().into_poll(Id::new(), Utc::now()).unwrap(),
        }
    }

    #[test]
    fn spec_becomes_active_poll_with_ids() {
        let now = Utc::now();
        let poll = PollSpec::example().into_poll(Id::new(), now).unwrap();
        assert!(poll.is_active);
        assert_eq!(poll.start_time, now);
        assert_eq!(poll.questions.len(), 2);
        assert_eq!(poll.questions[0].options.len(), 3);
        assert_ne!(poll.questions[0].id, poll.questions[1].id);
        assert_eq!(poll.target, None);
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let now = Utc::now();

        let mut spec = PollSpec::example();
        spec.title = "".into();
        assert!(spec.into_poll(Id::new(), now).is_err());

        let mut spec = PollSpec::example();
        spec.questions.clear();
        assert!(spec.into_poll(Id::new(), now).is_err());

        let mut spec = PollSpec::example();
        spec.questions[1].options.truncate(1);
        assert!(spec.into_poll(Id::new(), now).is_err());

        let mut spec = PollSpec::example();
        spec.end_time = Some(now - Duration::hours(1));
        assert!(spec.into_poll(Id::new(), now).is_err());

        let spec = PollSpec::targeted_example(TargetFilter {
            age_min: Some(60),
            age_max: Some(18),
            ..Default::default()
        });
        assert!(spec.into_poll(Id::new(), now).is_err());
    }

    #[test]
    fn submission_must_cover_every_question_once() {
        let poll = poll();
        let description = PollDescription::from(poll.clone());
        let user = Id::new();

        let responses = ResponseSubmission::choosing(&description, 1)
            .into_responses(&poll, user, Utc::now())
            .unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].option_id, poll.questions[0].options[1].id);

        let mut partial = ResponseSubmission::choosing(&description, 0);
        partial.answers.pop();
        assert!(partial.into_responses(&poll, user, Utc::now()).is_err());

        let mut doubled = ResponseSubmission::choosing(&description, 0);
        doubled.answers.push(doubled.answers[0]);
        assert!(doubled.into_responses(&poll, user, Utc::now()).is_err());

        let mut crossed = ResponseSubmission::choosing(&description, 0);
        crossed.answers[0].option_id = crossed.answers[1].option_id;
        assert!(crossed.into_responses(&poll, user, Utc::now()).is_err());
    }
}
