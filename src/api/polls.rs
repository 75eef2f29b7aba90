use std::collections::{HashMap, HashSet};

use chrono::Utc;
use log::info;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    options::FindOptions,
    Client,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            poll::{PollDescription, PollSpec, ResponseSubmission},
        },
        common::{
            audience::Viewer,
            poll_results::{aggregate, breakdown, Demographic, PollResult},
        },
        db::{
            admin::Admin,
            poll::{NewPoll, Poll, PollClosers},
            response::{NewPollResponse, PollResponse},
            user::User,
        },
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
};

use super::common::{citizen_by_token, inserted_id, live_at, poll_by_id};

pub fn routes() -> Vec<Route> {
    routes![
        get_polls_admin,
        get_polls,
        get_poll_admin,
        get_poll,
        create_poll,
        update_poll,
        deactivate_poll,
        close_poll,
        delete_poll,
        submit_responses,
        get_results_admin,
        get_results,
    ]
}

fn newest_first() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .build()
}

/// Has the citizen answered any question of the poll?
async fn has_answered(poll_id: Id, user_id: Id, responses: &Coll<PollResponse>) -> Result<bool> {
    let filter = doc! {
        "poll_id": poll_id,
        "user_id": user_id,
    };
    Ok(responses.count_documents(filter, None).await? > 0)
}

/// Aggregate a poll, optionally broken down by a respondent attribute.
async fn results(
    poll: &Poll,
    by: Option<Demographic>,
    responses: &Coll<PollResponse>,
    users: &Coll<User>,
) -> Result<PollResult> {
    let poll_responses: Vec<PollResponse> = responses
        .find(doc! { "poll_id": poll.id }, None)
        .await?
        .try_collect()
        .await?;
    let result = aggregate(poll, &poll_responses);

    let by = match by {
        Some(by) => by,
        None => return Ok(result),
    };
    let respondents: HashSet<Id> = poll_responses.iter().map(|r| r.user_id).collect();
    let ids: Vec<Id> = respondents.into_iter().collect();
    let profiles: HashMap<Id, Viewer> = users
        .find(doc! { "_id": { "$in": ids } }, None)
        .await?
        .map_ok(|user| (user.id, user.viewer()))
        .try_collect()
        .await?;
    let groups = breakdown(poll, &poll_responses, &profiles, by, Utc::now().date_naive());
    Ok(result.with_breakdown(groups))
}

#[get("/polls?<active>", rank = 1)]
async fn get_polls_admin(
    _token: AuthToken<Admin>,
    active: Option<bool>,
    polls: Coll<Poll>,
) -> Result<Json<Vec<PollDescription>>> {
    let mut filter = Document::new();
    if let Some(active) = active {
        filter.insert("is_active", active);
    }
    let poll_list: Vec<PollDescription> = polls
        .find(filter, newest_first())
        .await?
        .map_ok(PollDescription::from)
        .try_collect()
        .await?;
    Ok(Json(poll_list))
}

#[get("/polls", rank = 2)]
async fn get_polls(
    token: AuthToken<User>,
    users: Coll<User>,
    polls: Coll<Poll>,
    responses: Coll<PollResponse>,
) -> Result<Json<Vec<PollDescription>>> {
    let viewer = citizen_by_token(&token, &users).await?.viewer();
    let now = Utc::now();

    // The database narrows to live polls; targeting is checked here.
    let live: Vec<Poll> = polls
        .find(live_at(now), newest_first())
        .await?
        .try_collect()
        .await?;
    let answered: HashSet<Id> = responses
        .distinct("poll_id", doc! { "user_id": token.id }, None)
        .await?
        .into_iter()
        .filter_map(|id| id.as_object_id().map(Id::from))
        .collect();

    let open = live
        .into_iter()
        .filter(|poll| poll.is_open_to(&viewer, now))
        .map(|poll| {
            let answered = answered.contains(&poll.id);
            PollDescription::from(poll).answered(answered)
        })
        .collect();
    Ok(Json(open))
}

#[get("/polls/<poll_id>", rank = 1)]
async fn get_poll_admin(
    _token: AuthToken<Admin>,
    poll_id: Id,
    polls: Coll<Poll>,
) -> Result<Json<PollDescription>> {
    let poll = poll_by_id(poll_id, &polls).await?;
    Ok(Json(poll.into()))
}

#[get("/polls/<poll_id>", rank = 2)]
async fn get_poll(
    token: AuthToken<User>,
    poll_id: Id,
    users: Coll<User>,
    polls: Coll<Poll>,
    responses: Coll<PollResponse>,
) -> Result<Json<PollDescription>> {
    let viewer = citizen_by_token(&token, &users).await?.viewer();
    let poll = poll_by_id(poll_id, &polls).await?;
    if !poll.is_open_to(&viewer, Utc::now()) {
        return Err(Error::not_found(format!("Open poll {poll_id}")));
    }
    let answered = has_answered(poll_id, token.id, &responses).await?;
    Ok(Json(PollDescription::from(poll).answered(answered)))
}

#[post("/polls", data = "<spec>", format = "json")]
async fn create_poll(
    token: AuthToken<Admin>,
    spec: Json<PollSpec>,
    polls: Coll<Poll>,
    new_polls: Coll<NewPoll>,
    poll_closers: &State<PollClosers>,
) -> Result<Json<PollDescription>> {
    let poll = spec.0.into_poll(token.id, Utc::now())?;
    let new_id = inserted_id(new_polls.insert_one(&poll, None).await?)?;
    let poll = poll_by_id(new_id, &polls).await?;

    poll_closers.schedule_poll(polls, &poll).await;
    info!("Created poll {} '{}'", poll.id, poll.title);
    Ok(Json(poll.into()))
}

#[put("/polls/<poll_id>", data = "<spec>", format = "json")]
async fn update_poll(
    _token: AuthToken<Admin>,
    poll_id: Id,
    spec: Json<PollSpec>,
    polls: Coll<Poll>,
    new_polls: Coll<NewPoll>,
    responses: Coll<PollResponse>,
    poll_closers: &State<PollClosers>,
) -> Result<Json<PollDescription>> {
    let existing = poll_by_id(poll_id, &polls).await?;

    // Answers refer to question and option IDs, which a new spec would replace.
    let answered = responses
        .count_documents(doc! { "poll_id": poll_id }, None)
        .await?;
    if answered > 0 {
        return Err(Error::bad_request(format!(
            "Poll {poll_id} already has responses and cannot be modified"
        )));
    }

    let mut spec = spec.0;
    spec.start_time.get_or_insert(existing.start_time);
    let mut poll = spec.into_poll(existing.created_by, Utc::now())?;
    poll.created_at = existing.created_at;
    poll.is_active = existing.is_active;
    new_polls.replace_one(poll_id.as_doc(), &poll, None).await?;

    let poll = poll_by_id(poll_id, &polls).await?;
    poll_closers.schedule_poll(polls, &poll).await;
    Ok(Json(poll.into()))
}

#[post("/polls/<poll_id>/deactivate")]
async fn deactivate_poll(
    _token: AuthToken<Admin>,
    poll_id: Id,
    polls: Coll<Poll>,
    poll_closers: &State<PollClosers>,
) -> Result<()> {
    let update = doc! {
        "$set": { "is_active": false }
    };
    let result = polls.update_one(poll_id.as_doc(), update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Poll {poll_id}")));
    }
    poll_closers.cancel_poll(poll_id).await;
    info!("Deactivated poll {poll_id}");
    Ok(())
}

#[post("/polls/<poll_id>/close")]
async fn close_poll(
    _token: AuthToken<Admin>,
    poll_id: Id,
    polls: Coll<Poll>,
    poll_closers: &State<PollClosers>,
) -> Result<Json<PollDescription>> {
    // End the poll's window here, so results read as a finished poll.
    let filter = doc! {
        "_id": poll_id,
        "is_active": true,
    };
    let update = doc! {
        "$set": { "end_time": BsonDateTime::from_chrono(Utc::now()) }
    };
    let result = polls.update_one(filter, update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Active poll {poll_id}")));
    }

    poll_closers.close_now(polls.clone(), poll_id).await?;
    info!("Closed poll {poll_id} early");
    let poll = poll_by_id(poll_id, &polls).await?;
    Ok(Json(poll.into()))
}

#[delete("/polls/<poll_id>")]
async fn delete_poll(
    _token: AuthToken<Admin>,
    poll_id: Id,
    polls: Coll<Poll>,
    responses: Coll<PollResponse>,
    db_client: &State<Client>,
    poll_closers: &State<PollClosers>,
) -> Result<()> {
    // Atomically delete the poll and all its responses.
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let result = polls
        .delete_one_with_session(poll_id.as_doc(), None, &mut session)
        .await?;
    if result.deleted_count == 0 {
        session.abort_transaction().await?;
        return Err(Error::not_found(format!("Poll {poll_id}")));
    }
    responses
        .delete_many_with_session(doc! { "poll_id": poll_id }, None, &mut session)
        .await?;

    session.commit_transaction().await?;
    poll_closers.cancel_poll(poll_id).await;
    info!("Deleted poll {poll_id}");
    Ok(())
}

#[post("/polls/<poll_id>/responses", data = "<submission>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn submit_responses(
    token: AuthToken<User>,
    poll_id: Id,
    submission: Json<ResponseSubmission>,
    users: Coll<User>,
    polls: Coll<Poll>,
    responses: Coll<PollResponse>,
    new_responses: Coll<NewPollResponse>,
    db_client: &State<Client>,
) -> Result<()> {
    let viewer = citizen_by_token(&token, &users).await?.viewer();
    let poll = poll_by_id(poll_id, &polls).await?;
    let now = Utc::now();
    if !poll.is_open_to(&viewer, now) {
        return Err(Error::not_found(format!("Open poll {poll_id}")));
    }
    if has_answered(poll_id, token.id, &responses).await? {
        return Err(Error::conflict(format!("Poll {poll_id} already answered")));
    }
    let answers = submission.0.into_responses(&poll, token.id, now)?;

    // All answers or none; the unique index catches concurrent submissions.
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;
    match new_responses
        .insert_many_with_session(&answers, None, &mut session)
        .await
    {
        Ok(_) => session.commit_transaction().await?,
        Err(e) => {
            session.abort_transaction().await?;
            return Err(if is_duplicate_key_error(&e) {
                Error::conflict(format!("Poll {poll_id} already answered"))
            } else {
                e.into()
            });
        }
    }
    Ok(())
}

#[get("/polls/<poll_id>/results?<breakdown>", rank = 1)]
async fn get_results_admin(
    _token: AuthToken<Admin>,
    poll_id: Id,
    breakdown: Option<Demographic>,
    users: Coll<User>,
    polls: Coll<Poll>,
    responses: Coll<PollResponse>,
) -> Result<Json<PollResult>> {
    let poll = poll_by_id(poll_id, &polls).await?;
    Ok(Json(results(&poll, breakdown, &responses, &users).await?))
}

#[get("/polls/<poll_id>/results?<breakdown>", rank = 2)]
async fn get_results(
    token: AuthToken<User>,
    poll_id: Id,
    breakdown: Option<Demographic>,
    users: Coll<User>,
    polls: Coll<Poll>,
    responses: Coll<PollResponse>,
) -> Result<Json<PollResult>> {
    let poll = poll_by_id(poll_id, &polls).await?;
    if !has_answered(poll_id, token.id, &responses).await? {
        return Err(Error::Status(
            Status::Forbidden,
            format!("Answer poll {poll_id} to see its results"),
        ));
    }
    Ok(Json(results(&poll, breakdown, &responses, &users).await?))
}
