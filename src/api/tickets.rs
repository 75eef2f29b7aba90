use chrono::Utc;
use log::info;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    options::FindOptions,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            pagination::{Paginated, PaginationRequest},
            ticket::{TicketDescription, TicketSpec, TicketUpdate},
        },
        common::ticket::TicketStatus,
        db::{
            admin::Admin,
            ticket::{NewTicket, Ticket},
            user::User,
        },
        mongodb::{Coll, Id},
    },
};

use super::common::{citizen_by_token, inserted_id};

pub fn routes() -> Vec<Route> {
    routes![open_ticket, get_tickets_admin, get_tickets, update_ticket]
}

async fn ticket_by_id(ticket_id: Id, tickets: &Coll<Ticket>) -> Result<Ticket> {
    tickets
        .find_one(ticket_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Ticket {ticket_id}")))
}

#[post("/tickets", data = "<spec>", format = "json")]
async fn open_ticket(
    token: AuthToken<User>,
    spec: Json<TicketSpec>,
    users: Coll<User>,
    tickets: Coll<Ticket>,
    new_tickets: Coll<NewTicket>,
) -> Result<Json<TicketDescription>> {
    let user = citizen_by_token(&token, &users).await?;
    let ticket = spec.0.into_ticket(user.id, Utc::now())?;
    let ticket_id = inserted_id(new_tickets.insert_one(&ticket, None).await?)?;
    info!("User {} opened ticket {ticket_id}", user.id);
    Ok(Json(ticket_by_id(ticket_id, &tickets).await?.into()))
}

#[get("/tickets?<status>&<pagination..>", rank = 1)]
async fn get_tickets_admin(
    _token: AuthToken<Admin>,
    status: Option<TicketStatus>,
    pagination: PaginationRequest,
    tickets: Coll<Ticket>,
) -> Result<Json<Paginated<TicketDescription>>> {
    let mut filter = Document::new();
    if let Some(status) = status {
        filter.insert("status", status);
    }

    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .skip(pagination.skip())
        .limit(i64::from(pagination.page_size()))
        .build();
    let page: Vec<TicketDescription> = tickets
        .find(filter.clone(), options)
        .await?
        .map_ok(TicketDescription::from)
        .try_collect()
        .await?;
    let total = tickets.count_documents(filter, None).await?;

    Ok(Json(pagination.to_paginated(total, page)))
}

#[get("/tickets", rank = 2)]
async fn get_tickets(
    token: AuthToken<User>,
    tickets: Coll<Ticket>,
) -> Result<Json<Vec<TicketDescription>>> {
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .build();
    let own: Vec<TicketDescription> = tickets
        .find(doc! { "user_id": token.id }, options)
        .await?
        .map_ok(TicketDescription::from)
        .try_collect()
        .await?;
    Ok(Json(own))
}

#[put("/tickets/<ticket_id>", data = "<update>", format = "json")]
async fn update_ticket(
    _token: AuthToken<Admin>,
    ticket_id: Id,
    update: Json<TicketUpdate>,
    tickets: Coll<Ticket>,
) -> Result<Json<TicketDescription>> {
    let mut changes = doc! {
        "status": update.status,
        "updated_at": BsonDateTime::from_chrono(Utc::now()),
    };
    // A missing response leaves the previous one in place.
    if let Some(response) = update.0.admin_response {
        let response = response.trim();
        if response.is_empty() {
            changes.insert("admin_response", None::<String>);
        } else {
            changes.insert("admin_response", response);
        }
    }

    let result = tickets
        .update_one(ticket_id.as_doc(), doc! { "$set": changes }, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Ticket {ticket_id}")));
    }
    Ok(Json(ticket_by_id(ticket_id, &tickets).await?.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use super::*;

    fn ticket(user_id: Id, subject: &str, status: TicketStatus) -> NewTicket {
        let mut ticket = TicketSpec {
            subject: subject.into(),
            message: "Please take a look".into(),
        }
        .into_ticket(user_id, Utc::now())
        .unwrap();
        ticket.status = status;
        ticket
    }

    #[backend_test(citizen)]
    async fn citizen_opens_and_lists_own_tickets(
        client: Client,
        new_tickets: Coll<NewTicket>,
        tickets: Coll<Ticket>,
    ) {
        // Someone else's ticket stays hidden.
        new_tickets
            .insert_one(ticket(Id::new(), "Not mine", TicketStatus::Open), None)
            .await
            .unwrap();

        let response = client
            .post(uri!(open_ticket))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&TicketSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let opened: TicketDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(opened.status, TicketStatus::Open);
        assert_eq!(tickets.count_documents(None, None).await.unwrap(), 2);

        let response = client.get("/tickets").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let own: Vec<TicketDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(own, vec![opened]);

        // Only admins answer tickets.
        let response = client
            .put(uri!(update_ticket(*own[0].id)))
            .header(ContentType::JSON)
            .body(r#"{"status": "closed"}"#)
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(citizen)]
    async fn blank_ticket_rejected(client: Client, tickets: Coll<Ticket>) {
        let response = client
            .post(uri!(open_ticket))
            .header(ContentType::JSON)
            .body(r#"{"subject": " ", "message": "help"}"#)
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(tickets.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(admin)]
    async fn admin_filters_and_answers(
        client: Client,
        new_tickets: Coll<NewTicket>,
        tickets: Coll<Ticket>,
    ) {
        let citizen = Id::new();
        new_tickets
            .insert_many(
                [
                    ticket(citizen, "First", TicketStatus::Open),
                    ticket(citizen, "Second", TicketStatus::Resolved),
                    ticket(citizen, "Third", TicketStatus::Open),
                ],
                None,
            )
            .await
            .unwrap();

        let response = client.get("/tickets?status=open").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let page: Paginated<TicketDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.pagination.total, 2);
        assert!(page.items.iter().all(|t| t.status == TicketStatus::Open));

        let response = client.get("/tickets?page_num=2&page_size=2").dispatch().await;
        let page: Paginated<TicketDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.items.len(), 1);

        let first = tickets
            .find_one(doc! { "subject": "First" }, None)
            .await
            .unwrap()
            .unwrap();
        let response = client
            .put(uri!(update_ticket(first.id)))
            .header(ContentType::JSON)
            .body(r#"{"status": "in_progress", "admin_response": "Looking into it"}"#)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let updated: TicketDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(updated.status, TicketStatus::InProgress);
        assert_eq!(updated.admin_response.as_deref(), Some("Looking into it"));
        assert!(updated.updated_at >= updated.created_at);

        // The response survives a status-only change.
        let response = client
            .put(uri!(update_ticket(first.id)))
            .header(ContentType::JSON)
            .body(r#"{"status": "resolved"}"#)
            .dispatch()
            .await;
        let updated: TicketDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(updated.status, TicketStatus::Resolved);
        assert_eq!(updated.admin_response.as_deref(), Some("Looking into it"));

        let response = client
            .put(uri!(update_ticket(Id::new())))
            .header(ContentType::JSON)
            .body(r#"{"status": "closed"}"#)
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
