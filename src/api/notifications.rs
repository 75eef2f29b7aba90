use chrono::Utc;
use log::info;
use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            notification::{NotificationDescription, NotificationSpec},
        },
        db::{
            admin::Admin,
            notification::{NewNotification, Notification},
            user::User,
        },
        mongodb::{Coll, Id},
    },
};

use super::common::{citizen_by_token, inserted_id, live_at};

pub fn routes() -> Vec<Route> {
    routes![
        get_notifications_admin,
        get_notifications,
        create_notification,
        update_notification,
        deactivate_notification,
    ]
}

fn newest_first() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .build()
}

async fn notification_by_id(
    notification_id: Id,
    notifications: &Coll<Notification>,
) -> Result<Notification> {
    notifications
        .find_one(notification_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Notification {notification_id}")))
}

#[get("/notifications", rank = 1)]
async fn get_notifications_admin(
    _token: AuthToken<Admin>,
    notifications: Coll<Notification>,
) -> Result<Json<Vec<NotificationDescription>>> {
    let all: Vec<NotificationDescription> = notifications
        .find(None, newest_first())
        .await?
        .map_ok(NotificationDescription::from)
        .try_collect()
        .await?;
    Ok(Json(all))
}

#[get("/notifications", rank = 2)]
async fn get_notifications(
    token: AuthToken<User>,
    users: Coll<User>,
    notifications: Coll<Notification>,
) -> Result<Json<Vec<NotificationDescription>>> {
    let viewer = citizen_by_token(&token, &users).await?.viewer();
    let now = Utc::now();
    let visible: Vec<NotificationDescription> = notifications
        .find(live_at(now), newest_first())
        .await?
        .try_filter(|notification| {
            let visible = notification.is_visible_to(&viewer, now);
            async move { visible }
        })
        .map_ok(NotificationDescription::from)
        .try_collect()
        .await?;
    Ok(Json(visible))
}

#[post("/notifications", data = "<spec>", format = "json")]
async fn create_notification(
    token: AuthToken<Admin>,
    spec: Json<NotificationSpec>,
    notifications: Coll<Notification>,
    new_notifications: Coll<NewNotification>,
) -> Result<Json<NotificationDescription>> {
    let notification = spec.0.into_notification(token.id, Utc::now())?;
    let result = new_notifications.insert_one(&notification, None).await?;
    let notification = notification_by_id(inserted_id(result)?, &notifications).await?;
    info!("Created notification {} '{}'", notification.id, notification.title);
    Ok(Json(notification.into()))
}

#[put("/notifications/<notification_id>", data = "<spec>", format = "json")]
async fn update_notification(
    _token: AuthToken<Admin>,
    notification_id: Id,
    spec: Json<NotificationSpec>,
    notifications: Coll<Notification>,
    new_notifications: Coll<NewNotification>,
) -> Result<Json<NotificationDescription>> {
    let existing = notification_by_id(notification_id, &notifications).await?;

    let mut spec = spec.0;
    spec.start_time.get_or_insert(existing.start_time);
    let mut notification = spec.into_notification(existing.created_by, Utc::now())?;
    notification.created_at = existing.created_at;
    notification.is_active = existing.is_active;
    new_notifications
        .replace_one(notification_id.as_doc(), &notification, None)
        .await?;

    let notification = notification_by_id(notification_id, &notifications).await?;
    Ok(Json(notification.into()))
}

#[delete("/notifications/<notification_id>")]
async fn deactivate_notification(
    _token: AuthToken<Admin>,
    notification_id: Id,
    notifications: Coll<Notification>,
) -> Result<()> {
    let update = doc! {
        "$set": { "is_active": false }
    };
    let result = notifications
        .update_one(notification_id.as_doc(), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Notification {notification_id}")));
    }
    info!("Deactivated notification {notification_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Duration;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };

    use crate::model::common::{audience::TargetFilter, notification::NotificationKind};

    use super::*;

    async fn insert(new_notifications: &Coll<NewNotification>, spec: NotificationSpec) -> Id {
        let notification = spec.into_notification(Id::new(), Utc::now()).unwrap();
        new_notifications
            .insert_one(notification, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    async fn listed(response: LocalResponse<'_>) -> Vec<NotificationDescription> {
        assert_eq!(Status::Ok, response.status());
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    #[backend_test(admin)]
    async fn admin_manages_notifications(client: Client, notifications: Coll<Notification>) {
        let response = client
            .post(uri!(create_notification))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&NotificationSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let created: NotificationDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(created.kind, NotificationKind::Update);

        rocket::tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let mut spec = NotificationSpec::example();
        spec.kind = NotificationKind::Alert;
        spec.title = "Booth list corrected".into();
        let response = client
            .put(uri!(update_notification(*created.id)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let stored = notifications
            .find_one(created.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, "Booth list corrected");
        assert_eq!(stored.kind, NotificationKind::Alert);
        assert_eq!(stored.created_at, created.created_at);
        // The update left out the start time, so the original one stands.
        assert_eq!(stored.start_time, created.start_time);

        let response = client
            .delete(uri!(deactivate_notification(*created.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        // Admins still see deactivated notifications.
        let all = listed(client.get("/notifications").dispatch().await).await;
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);

        let response = client
            .delete(uri!(deactivate_notification(Id::new())))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn blank_notification_rejected(client: Client, notifications: Coll<Notification>) {
        let mut spec = NotificationSpec::example();
        spec.title = "  ".into();
        let response = client
            .post(uri!(create_notification))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(notifications.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(citizen)]
    async fn citizen_sees_targeted_and_live_only(
        client: Client,
        new_notifications: Coll<NewNotification>,
    ) {
        let everyone = insert(&new_notifications, NotificationSpec::example()).await;
        let kerala_women = insert(
            &new_notifications,
            NotificationSpec::targeted_example(TargetFilter::kerala_women()),
        )
        .await;
        let goa_only = TargetFilter {
            states: HashSet::from(["Goa".to_string()]),
            ..Default::default()
        };
        insert(&new_notifications, NotificationSpec::targeted_example(goa_only)).await;

        let mut expired = NotificationSpec::example();
        expired.start_time = Some(Utc::now() - Duration::days(2));
        expired.end_time = Some(Utc::now() - Duration::days(1));
        insert(&new_notifications, expired).await;

        let mut upcoming = NotificationSpec::example();
        upcoming.start_time = Some(Utc::now() + Duration::days(1));
        insert(&new_notifications, upcoming).await;

        let visible = listed(client.get("/notifications").dispatch().await).await;
        let ids: Vec<Id> = visible.iter().map(|n| *n.id).collect();
        // Newest first.
        assert_eq!(ids, vec![kerala_women, everyone]);
    }

    #[backend_test(citizen)]
    async fn citizen_cannot_create(client: Client, notifications: Coll<Notification>) {
        let response = client
            .post(uri!(create_notification))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&NotificationSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(notifications.count_documents(None, None).await.unwrap(), 0);
    }
}
