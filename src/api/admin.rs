use log::info;
use mongodb::{
    bson::{doc, Document},
    options::FindOptions,
    Client,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            admin::{AdminCredentials, AdminDescription, DashboardStats},
            auth::AuthToken,
            pagination::{Paginated, PaginationRequest},
            user::{ActiveFlag, UserDescription},
        },
        common::ticket::TicketStatus,
        db::{
            admin::{Admin, NewAdmin},
            leader::Leader,
            notification::Notification,
            poll::Poll,
            rating::Rating,
            response::PollResponse,
            ticket::Ticket,
            user::User,
        },
        mongodb::{Coll, Id},
    },
};

use super::common::live_at;

pub fn routes() -> Vec<Route> {
    routes![
        get_admins,
        create_admin,
        delete_admin,
        get_stats,
        get_users,
        set_user_active,
        delete_user,
    ]
}

#[get("/admins")]
async fn get_admins(
    _token: AuthToken<Admin>,
    admins: Coll<Admin>,
) -> Result<Json<Vec<AdminDescription>>> {
    let options = FindOptions::builder().sort(doc! { "username": 1 }).build();
    let admin_list: Vec<AdminDescription> = admins
        .find(None, options)
        .await?
        .map_ok(AdminDescription::from)
        .try_collect()
        .await?;
    Ok(Json(admin_list))
}

#[post("/admins", data = "<new_admin>", format = "json")]
async fn create_admin(
    _token: AuthToken<Admin>,
    new_admin: Json<AdminCredentials>,
    admins: Coll<Admin>,
    new_admins: Coll<NewAdmin>,
) -> Result<Json<AdminDescription>> {
    // Check username uniqueness.
    let with_username = doc! {
        "username": &new_admin.username,
    };
    if admins.find_one(with_username.clone(), None).await?.is_some() {
        return Err(Error::conflict(format!(
            "Admin username already in use: {}",
            new_admin.username
        )));
    }

    // Create and insert the admin.
    let admin: NewAdmin = new_admin.0.try_into()?;
    new_admins.insert_one(&admin, None).await?;
    let admin = admins
        .find_one(with_username, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Admin {}", admin.username)))?;
    info!("Created admin {}", admin.username);
    Ok(Json(admin.into()))
}

#[delete("/admins", data = "<username>")]
async fn delete_admin(
    _token: AuthToken<Admin>,
    username: String,
    admins: Coll<Admin>,
) -> Result<()> {
    // Prevent deleting the last admin.
    let count = admins.count_documents(None, None).await?;
    if count <= 1 {
        return Err(Error::Status(
            Status::UnprocessableEntity,
            "Cannot delete last admin!".to_string(),
        ));
    }

    let filter = doc! {
        "username": &username,
    };
    let result = admins.delete_one(filter, None).await?;
    if result.deleted_count == 0 {
        Err(Error::not_found(format!("Admin {username}")))
    } else {
        info!("Deleted admin {username}");
        Ok(())
    }
}

#[get("/admin/stats")]
#[allow(clippy::too_many_arguments)]
async fn get_stats(
    _token: AuthToken<Admin>,
    users: Coll<User>,
    leaders: Coll<Leader>,
    ratings: Coll<Rating>,
    polls: Coll<Poll>,
    responses: Coll<PollResponse>,
    notifications: Coll<Notification>,
    tickets: Coll<Ticket>,
) -> Result<Json<DashboardStats>> {
    let now = chrono::Utc::now();
    let stats = DashboardStats {
        users: users.count_documents(None, None).await?,
        active_users: users
            .count_documents(doc! { "is_active": true }, None)
            .await?,
        leaders: leaders
            .count_documents(doc! { "is_active": true }, None)
            .await?,
        ratings: ratings.count_documents(None, None).await?,
        active_polls: polls.count_documents(live_at(now), None).await?,
        poll_responses: responses.count_documents(None, None).await?,
        active_notifications: notifications.count_documents(live_at(now), None).await?,
        open_tickets: tickets
            .count_documents(doc! { "status": TicketStatus::Open }, None)
            .await?,
    };
    Ok(Json(stats))
}

#[get("/users?<search>&<pagination..>")]
async fn get_users(
    _token: AuthToken<Admin>,
    search: Option<String>,
    pagination: PaginationRequest,
    users: Coll<User>,
) -> Result<Json<Paginated<UserDescription>>> {
    let mut filter = Document::new();
    if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
        let pattern = regex::escape(search.trim());
        filter.insert(
            "$or",
            vec![
                doc! { "email": { "$regex": &pattern, "$options": "i" } },
                doc! { "full_name": { "$regex": &pattern, "$options": "i" } },
            ],
        );
    }

    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .skip(pagination.skip())
        .limit(i64::from(pagination.page_size()))
        .build();
    let page: Vec<UserDescription> = users
        .find(filter.clone(), options)
        .await?
        .map_ok(UserDescription::from)
        .try_collect()
        .await?;
    let total = users.count_documents(filter, None).await?;

    Ok(Json(pagination.to_paginated(total, page)))
}

#[put("/users/<user_id>/active", data = "<flag>", format = "json")]
async fn set_user_active(
    _token: AuthToken<Admin>,
    user_id: Id,
    flag: Json<ActiveFlag>,
    users: Coll<User>,
) -> Result<()> {
    let update = doc! {
        "$set": { "is_active": flag.is_active }
    };
    let result = users.update_one(user_id.as_doc(), update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Citizen {user_id}")));
    }
    info!(
        "Citizen {user_id} {}",
        if flag.is_active { "activated" } else { "deactivated" }
    );
    Ok(())
}

#[delete("/users/<user_id>")]
#[allow(clippy::too_many_arguments)]
async fn delete_user(
    _token: AuthToken<Admin>,
    user_id: Id,
    users: Coll<User>,
    ratings: Coll<Rating>,
    responses: Coll<PollResponse>,
    tickets: Coll<Ticket>,
    db_client: &State<Client>,
) -> Result<()> {
    // Atomically delete the citizen and everything they contributed.
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let result = users
        .delete_one_with_session(user_id.as_doc(), None, &mut session)
        .await?;
    if result.deleted_count == 0 {
        session.abort_transaction().await?;
        return Err(Error::not_found(format!("Citizen {user_id}")));
    }

    let filter = doc! {
        "user_id": user_id,
    };
    ratings
        .delete_many_with_session(filter.clone(), None, &mut session)
        .await?;
    responses
        .delete_many_with_session(filter.clone(), None, &mut session)
        .await?;
    tickets
        .delete_many_with_session(filter, None, &mut session)
        .await?;

    session.commit_transaction().await?;
    info!("Deleted citizen {user_id}");
    Ok(())
}
