use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            user::{ProfileUpdate, UserDescription},
        },
        db::user::{NewUser, User},
        mongodb::Coll,
    },
};

use super::common::citizen_by_token;

pub fn routes() -> Vec<Route> {
    routes![get_profile, update_profile]
}

#[get("/profile")]
async fn get_profile(token: AuthToken<User>, users: Coll<User>) -> Result<Json<UserDescription>> {
    let user = citizen_by_token(&token, &users).await?;
    Ok(Json(user.into()))
}

#[put("/profile", data = "<update>", format = "json")]
async fn update_profile(
    token: AuthToken<User>,
    update: Json<ProfileUpdate>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
) -> Result<Json<UserDescription>> {
    let mut user = citizen_by_token(&token, &users).await?;
    update.0.apply_to(&mut user, Utc::now().date_naive())?;
    new_users
        .replace_one(user.id.as_doc(), &user.user, None)
        .await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{serde_json, serde_json::json},
    };

    use super::*;

    #[backend_test(citizen)]
    async fn view_and_update_profile(client: Client, users: Coll<User>) {
        let response = client.get(uri!(get_profile)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let profile: UserDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(profile.full_name, "Asha Nair");

        let response = client
            .put(uri!(update_profile))
            .header(ContentType::JSON)
            .body(
                json!({
                    "full_name": "Asha N. Pillai",
                    "state": "Kerala",
                    "constituency": "Kollam",
                    "birth_date": "1995-06-15",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let stored = users.find_one(profile.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.full_name, "Asha N. Pillai");
        assert_eq!(stored.constituency.as_deref(), Some("Kollam"));
        assert_eq!(stored.gender, None);
        assert_eq!(stored.birth_date, NaiveDate::from_ymd_opt(1995, 6, 15));
        assert_eq!(stored.email, "asha.nair@example.com");
    }

    #[backend_test(citizen)]
    async fn future_birth_date_is_rejected(client: Client) {
        let response = client
            .put(uri!(update_profile))
            .header(ContentType::JSON)
            .body(json!({ "full_name": "Asha", "birth_date": "2999-01-01" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test]
    async fn profile_needs_login(client: Client) {
        let response = client.get(uri!(get_profile)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}
