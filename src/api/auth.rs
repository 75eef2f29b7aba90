use log::info;
use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::{
            admin::AdminCredentials,
            auth::{AuthToken, AUTH_TOKEN_COOKIE},
            user::{UserCredentials, UserDescription, UserRegistration},
        },
        db::{
            admin::Admin,
            user::{NewUser, User},
        },
        mongodb::{is_duplicate_key_error, Coll},
    },
};

use super::common::inserted_id;

pub fn routes() -> Vec<Route> {
    routes![authenticate, register, login, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<()> {
    let with_username = doc! {
        "username": &credentials.username
    };

    let admin = admins
        .find_one(with_username, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No admin found with the provided username and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config)?);

    Ok(())
}

#[post("/auth/register", data = "<registration>", format = "json")]
pub async fn register(
    cookies: &CookieJar<'_>,
    registration: Json<UserRegistration>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
    config: &State<Config>,
) -> Result<Json<UserDescription>> {
    let user: NewUser = registration.0.try_into()?;

    // The unique index on email settles races between identical registrations.
    let new_id = match new_users.insert_one(&user, None).await {
        Ok(result) => inserted_id(result)?,
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(Error::conflict(format!("Email already registered: {}", user.email)));
        }
        Err(e) => return Err(e.into()),
    };
    let user = users
        .find_one(new_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Citizen {new_id}")))?;
    info!("Registered citizen {}", user.id);

    cookies.add(AuthToken::new(&user).into_cookie(config)?);
    Ok(Json(user.into()))
}

#[post("/auth/user", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<UserCredentials>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<UserDescription>> {
    let with_email = doc! {
        "email": credentials.email.trim().to_lowercase(),
    };

    let user = users
        .find_one(with_email, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No citizen found with the provided email and password combination.".to_string(),
            )
        })?;
    if !user.is_active {
        return Err(Error::Status(
            Status::Unauthorized,
            "This account has been deactivated.".to_string(),
        ));
    }

    cookies.add(AuthToken::new(&user).into_cookie(config)?);
    Ok(Json(user.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::{serde_json, serde_json::json},
    };

    use crate::model::db::admin::NewAdmin;

    use super::*;

    #[backend_test]
    async fn admin_authenticate_valid(client: Client, admins: Coll<NewAdmin>) {
        // Ensure there is an admin to login as
        admins.insert_one(NewAdmin::example(), None).await.unwrap();

        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn admin_authenticate_invalid(client: Client, admins: Coll<NewAdmin>) {
        admins.insert_one(NewAdmin::example(), None).await.unwrap();

        // Unknown username.
        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::empty()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        // Wrong password.
        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": &NewAdmin::example().username,
                    "password": "",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn register_then_login(client: Client, users: Coll<User>) {
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(UserRegistration::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let description: UserDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(description.email, "asha.nair@example.com");
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let stored = users.find_one(description.id.as_doc(), None).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, UserRegistration::example().password);

        // Log out, then back in with a differently-cased email.
        client.delete(uri!(logout)).dispatch().await;
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
        let mut credentials = UserCredentials::example();
        credentials.email = credentials.email.to_uppercase();
        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!(credentials).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn duplicate_registration_conflicts(client: Client, users: Coll<User>) {
        for expected in [Status::Ok, Status::Conflict] {
            let response = client
                .post(uri!(register))
                .header(ContentType::JSON)
                .body(json!(UserRegistration::example()).to_string())
                .dispatch()
                .await;
            assert_eq!(expected, response.status());
        }
        assert_eq!(users.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test]
    async fn invalid_registration_is_rejected(client: Client, users: Coll<User>) {
        let mut registration = UserRegistration::example();
        registration.password = "short".into();
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(registration).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(users.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn deactivated_citizen_cannot_login(client: Client, users: Coll<User>) {
        client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(UserRegistration::example()).to_string())
            .dispatch()
            .await;
        users
            .update_one(doc! {}, doc! { "$set": { "is_active": false } }, None)
            .await
            .unwrap();

        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!(UserCredentials::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn wrong_password_is_unauthorized(client: Client) {
        client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(UserRegistration::example()).to_string())
            .dispatch()
            .await;
        let mut credentials = UserCredentials::example();
        credentials.password = "not-the-password".into();
        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!(credentials).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn logout_admin(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn logout_not_logged_in(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
    }
}
