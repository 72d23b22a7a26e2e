//! Request extractor for the signed-in user.
//!
//! The user id is stored in the `actix-identity` cookie by the auth service
//! sharing this application's cookie key.

use std::future::{Ready, ready};

use actix_identity::IdentityExt;
use actix_web::dev::Payload;
use actix_web::error::InternalError;
use actix_web::http::header;
use actix_web::{FromRequest, HttpRequest, HttpResponse, web};

use crate::domain::auth::AuthenticatedUser;
use crate::domain::types::UserId;
use crate::models::config::ServerConfig;

const DEFAULT_LOGIN_URL: &str = "/login";

fn user_from_request(req: &HttpRequest) -> Option<AuthenticatedUser> {
    let identity = req.get_identity().ok()?;
    let id = identity.id().ok()?;
    match id.trim().parse::<i32>().map(UserId::new) {
        Ok(Ok(user_id)) => Some(AuthenticatedUser::new(user_id)),
        _ => {
            log::warn!("Ignoring malformed identity '{id}'");
            None
        }
    }
}

fn login_redirect(req: &HttpRequest) -> actix_web::Error {
    let location = req
        .app_data::<web::Data<ServerConfig>>()
        .map(|config| config.auth_service_url.clone())
        .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());

    let response = HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish();
    InternalError::from_response("authentication required", response).into()
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(user_from_request(req).ok_or_else(|| login_redirect(req)))
    }
}
