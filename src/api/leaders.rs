use chrono::Utc;
use log::info;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    options::{FindOptions, UpdateOptions},
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            leader::{LeaderDescription, LeaderSpec, RatingDescription, RatingSpec},
            pagination::{Paginated, PaginationRequest},
        },
        db::{
            admin::Admin,
            leader::{Leader, NewLeader},
            rating::{Rating, RatingSummary},
            user::User,
        },
        mongodb::{Coll, Id},
    },
};

use super::common::inserted_id;

pub fn routes() -> Vec<Route> {
    routes![
        get_leaders_admin,
        get_leaders,
        get_leader_admin,
        get_leader,
        create_leader,
        update_leader,
        deactivate_leader,
        get_ratings,
        rate_leader,
    ]
}

/// Describe leaders along with their rating summaries.
async fn describe(leaders: Vec<Leader>, ratings: &Coll<Rating>) -> Result<Vec<LeaderDescription>> {
    let ids: Vec<Id> = leaders.iter().map(|leader| leader.id).collect();
    let summaries = RatingSummary::for_leaders(ratings, &ids).await?;
    Ok(leaders
        .into_iter()
        .map(|leader| {
            let summary = summaries.get(&leader.id);
            LeaderDescription::new(leader, summary)
        })
        .collect())
}

async fn find_leaders(filter: Document, leaders: &Coll<Leader>) -> Result<Vec<Leader>> {
    let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
    Ok(leaders.find(filter, options).await?.try_collect().await?)
}

/// Find one leader; inactive leaders only count when `active_only` is false.
async fn find_leader(leader_id: Id, active_only: bool, leaders: &Coll<Leader>) -> Result<Leader> {
    let mut filter = leader_id.as_doc();
    if active_only {
        filter.insert("is_active", true);
    }
    leaders
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Leader {leader_id}")))
}

#[get("/leaders?<state>", rank = 1)]
async fn get_leaders_admin(
    _token: AuthToken<Admin>,
    state: Option<String>,
    leaders: Coll<Leader>,
    ratings: Coll<Rating>,
) -> Result<Json<Vec<LeaderDescription>>> {
    let mut filter = Document::new();
    if let Some(state) = state {
        filter.insert("state", state);
    }
    let leader_list = find_leaders(filter, &leaders).await?;
    Ok(Json(describe(leader_list, &ratings).await?))
}

#[get("/leaders?<state>", rank = 2)]
async fn get_leaders(
    state: Option<String>,
    leaders: Coll<Leader>,
    ratings: Coll<Rating>,
) -> Result<Json<Vec<LeaderDescription>>> {
    let mut filter = doc! { "is_active": true };
    if let Some(state) = state {
        filter.insert("state", state);
    }
    let leader_list = find_leaders(filter, &leaders).await?;
    Ok(Json(describe(leader_list, &ratings).await?))
}

#[get("/leaders/<leader_id>", rank = 1)]
async fn get_leader_admin(
    _token: AuthToken<Admin>,
    leader_id: Id,
    leaders: Coll<Leader>,
    ratings: Coll<Rating>,
) -> Result<Json<LeaderDescription>> {
    let leader = find_leader(leader_id, false, &leaders).await?;
    let mut described = describe(vec![leader], &ratings).await?;
    described
        .pop()
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("Leader {leader_id}")))
}

#[get("/leaders/<leader_id>", rank = 2)]
async fn get_leader(
    leader_id: Id,
    leaders: Coll<Leader>,
    ratings: Coll<Rating>,
) -> Result<Json<LeaderDescription>> {
    let leader = find_leader(leader_id, true, &leaders).await?;
    let mut described = describe(vec![leader], &ratings).await?;
    described
        .pop()
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("Leader {leader_id}")))
}

#[post("/leaders", data = "<spec>", format = "json")]
async fn create_leader(
    _token: AuthToken<Admin>,
    spec: Json<LeaderSpec>,
    leaders: Coll<Leader>,
    new_leaders: Coll<NewLeader>,
) -> Result<Json<LeaderDescription>> {
    let leader = spec.0.into_leader(Utc::now())?;
    let new_id = inserted_id(new_leaders.insert_one(&leader, None).await?)?;
    let leader = find_leader(new_id, false, &leaders).await?;
    info!("Created leader {} ({})", leader.name, leader.id);
    Ok(Json(LeaderDescription::new(leader, None)))
}

#[put("/leaders/<leader_id>", data = "<spec>", format = "json")]
async fn update_leader(
    _token: AuthToken<Admin>,
    leader_id: Id,
    spec: Json<LeaderSpec>,
    leaders: Coll<Leader>,
    new_leaders: Coll<NewLeader>,
    ratings: Coll<Rating>,
) -> Result<Json<LeaderDescription>> {
    let existing = find_leader(leader_id, false, &leaders).await?;

    // Replace the details, keeping the bookkeeping fields.
    let mut leader = spec.0.into_leader(existing.created_at)?;
    leader.is_active = existing.is_active;
    new_leaders
        .replace_one(leader_id.as_doc(), &leader, None)
        .await?;

    let leader = find_leader(leader_id, false, &leaders).await?;
    let mut described = describe(vec![leader], &ratings).await?;
    described
        .pop()
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("Leader {leader_id}")))
}

#[delete("/leaders/<leader_id>")]
async fn deactivate_leader(
    _token: AuthToken<Admin>,
    leader_id: Id,
    leaders: Coll<Leader>,
) -> Result<()> {
    let update = doc! {
        "$set": { "is_active": false }
    };
    let result = leaders.update_one(leader_id.as_doc(), update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Leader {leader_id}")));
    }
    info!("Deactivated leader {leader_id}");
    Ok(())
}

#[get("/leaders/<leader_id>/ratings?<pagination..>")]
async fn get_ratings(
    leader_id: Id,
    pagination: PaginationRequest,
    ratings: Coll<Rating>,
) -> Result<Json<Paginated<RatingDescription>>> {
    let filter = doc! {
        "leader_id": leader_id,
    };
    let options = FindOptions::builder()
        .sort(doc! { "updated_at": -1 })
        .skip(pagination.skip())
        .limit(i64::from(pagination.page_size()))
        .build();
    let page: Vec<RatingDescription> = ratings
        .find(filter.clone(), options)
        .await?
        .map_ok(RatingDescription::from)
        .try_collect()
        .await?;
    let total = ratings.count_documents(filter, None).await?;

    Ok(Json(pagination.to_paginated(total, page)))
}

#[put("/leaders/<leader_id>/rating", data = "<spec>", format = "json")]
async fn rate_leader(
    token: AuthToken<User>,
    leader_id: Id,
    spec: Json<RatingSpec>,
    leaders: Coll<Leader>,
    ratings: Coll<Rating>,
) -> Result<Json<RatingDescription>> {
    let spec = spec.0.validate()?;
    find_leader(leader_id, true, &leaders).await?;

    // One rating per citizen per leader: re-rating replaces the score.
    let now = BsonDateTime::from_chrono(Utc::now());
    let filter = doc! {
        "leader_id": leader_id,
        "user_id": token.id,
    };
    let update = doc! {
        "$set": {
            "score": spec.score,
            "comment": spec.comment,
            "updated_at": now,
        },
        "$setOnInsert": {
            "created_at": now,
        },
    };
    let options = UpdateOptions::builder().upsert(true).build();
    ratings.update_one(filter.clone(), update, options).await?;

    let rating = ratings
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Rating of leader {leader_id}")))?;
    Ok(Json(rating.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use crate::model::api::{auth::AUTH_TOKEN_COOKIE, user::UserRegistration};

    use super::*;

    async fn insert_leader(new_leaders: &Coll<NewLeader>, spec: LeaderSpec) -> Id {
        new_leaders
            .insert_one(spec.into_leader(Utc::now()).unwrap(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    async fn rate(client: &Client, leader_id: Id, score: i32) -> Status {
        client
            .put(uri!(rate_leader(leader_id)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&RatingSpec::example(score)).unwrap())
            .dispatch()
            .await
            .status()
    }

    #[backend_test(admin)]
    async fn create_update_deactivate(client: Client, leaders: Coll<Leader>) {
        let response = client
            .post(uri!(create_leader))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&LeaderSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let created: LeaderDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(created.name, LeaderSpec::example().name);
        assert_eq!(created.rating_count, 0);
        assert_eq!(created.average_rating, None);

        let mut spec = LeaderSpec::example();
        spec.position = "Minister of Transport".into();
        let response = client
            .put(uri!(update_leader(*created.id)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let stored = leaders.find_one(created.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.position, "Minister of Transport");

        let response = client.delete(uri!(deactivate_leader(*created.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let stored = leaders.find_one(created.id.as_doc(), None).await.unwrap().unwrap();
        assert!(!stored.is_active);

        // Admins still see inactive leaders; the public does not.
        let response = client.get(uri!(get_leader(*created.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        client.delete("/auth").dispatch().await;
        let response = client.get(uri!(get_leader(*created.id))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn invalid_leader_is_rejected(client: Client, leaders: Coll<Leader>) {
        let mut spec = LeaderSpec::example();
        spec.name = "".into();
        let response = client
            .post(uri!(create_leader))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(leaders.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn public_listing_filters_by_state(client: Client, new_leaders: Coll<NewLeader>) {
        insert_leader(&new_leaders, LeaderSpec::example()).await;
        insert_leader(&new_leaders, LeaderSpec::example2()).await;

        let response = client.get("/leaders").dispatch().await;
        let all: Vec<LeaderDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(all.len(), 2);

        let response = client.get("/leaders?state=Goa").dispatch().await;
        let goa: Vec<LeaderDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(goa.len(), 1);
        assert_eq!(goa[0].name, LeaderSpec::example2().name);
    }

    #[backend_test(citizen)]
    async fn rating_and_rerating(
        client: Client,
        new_leaders: Coll<NewLeader>,
        ratings: Coll<Rating>,
    ) {
        let leader_id = insert_leader(&new_leaders, LeaderSpec::example()).await;

        assert_eq!(rate(&client, leader_id, 2).await, Status::Ok);
        assert_eq!(rate(&client, leader_id, 5).await, Status::Ok);
        assert_eq!(ratings.count_documents(None, None).await.unwrap(), 1);

        // A second citizen rates too.
        client.delete("/auth").dispatch().await;
        let response = client
            .post("/auth/register")
            .header(ContentType::JSON)
            .body(serde_json::to_string(&UserRegistration::example2()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        assert_eq!(rate(&client, leader_id, 4).await, Status::Ok);

        let response = client.get(uri!(get_leader(leader_id))).dispatch().await;
        let leader: LeaderDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(leader.rating_count, 2);
        assert_eq!(leader.average_rating, Some(4.5));

        let response = client
            .get(format!("/leaders/{leader_id}/ratings?page_size=1"))
            .dispatch()
            .await;
        let page: Paginated<RatingDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.items.len(), 1);
    }

    #[backend_test(citizen)]
    async fn out_of_range_score_is_rejected(client: Client, new_leaders: Coll<NewLeader>) {
        let leader_id = insert_leader(&new_leaders, LeaderSpec::example()).await;
        assert_eq!(rate(&client, leader_id, 0).await, Status::BadRequest);
        assert_eq!(rate(&client, leader_id, 6).await, Status::BadRequest);
        assert_eq!(rate(&client, Id::new(), 3).await, Status::NotFound);
    }

    #[backend_test]
    async fn rating_needs_citizen(client: Client, new_leaders: Coll<NewLeader>) {
        let leader_id = insert_leader(&new_leaders, LeaderSpec::example()).await;
        assert_eq!(rate(&client, leader_id, 3).await, Status::NotFound);
    }
}
