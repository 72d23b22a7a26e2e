use actix_multipart::form::MultipartForm;
use actix_session::Session;
use actix_web::{HttpResponse, Responder, get, post, route, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde::Deserialize;
use tera::Tera;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::types::PostId;
use crate::forms::errors::FieldErrors;
use crate::forms::posts::{OldInput, PostForm};
use crate::models::config::ServerConfig;
use crate::repository::DieselRepository;
use crate::routes::{base_context, redirect, render_template};
use crate::services::posts::{
    destroy_post as destroy_post_service, show_create_form as show_create_form_service,
    show_edit_form as show_edit_form_service, show_post as show_post_service,
    show_posts as show_posts_service, store_post as store_post_service,
    update_post as update_post_service,
};
use crate::services::{Redirect, ServiceError};
use crate::storage::LocalPublicStorage;

const ERRORS_KEY: &str = "errors";
const OLD_INPUT_KEY: &str = "old";

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub page: Option<usize>,
}

/// Keeps the failed submission around for the next form render.
fn remember_failed_input(session: &Session, errors: &FieldErrors, old: &OldInput) {
    if let Err(e) = session.insert(ERRORS_KEY, errors) {
        log::error!("Failed to store validation errors in session: {e}");
    }
    if let Err(e) = session.insert(OLD_INPUT_KEY, old) {
        log::error!("Failed to store old input in session: {e}");
    }
}

/// Takes the errors and input left by a failed submission, if any.
fn take_failed_input(session: &Session) -> (FieldErrors, Option<OldInput>) {
    let errors = match session.remove_as::<FieldErrors>(ERRORS_KEY) {
        Some(Ok(errors)) => errors,
        Some(Err(raw)) => {
            log::warn!("Discarding unreadable validation errors: {raw}");
            FieldErrors::default()
        }
        None => FieldErrors::default(),
    };
    let old = session
        .remove_as::<OldInput>(OLD_INPUT_KEY)
        .and_then(Result::ok);
    (errors, old)
}

fn show_redirect(post_id: i32) -> Redirect {
    PostId::new(post_id)
        .map(Redirect::ShowPost)
        .unwrap_or(Redirect::Index)
}

#[get("/")]
pub async fn index(
    user: Option<AuthenticatedUser>,
    query: web::Query<IndexQuery>,
    flash_messages: IncomingFlashMessages,
    repo: web::Data<DieselRepository>,
    storage: web::Data<LocalPublicStorage>,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let page = query.page.unwrap_or(1);

    match show_posts_service(page, repo.get_ref(), storage.get_ref()) {
        Ok(posts) => {
            let mut context = base_context(
                &flash_messages,
                user.as_ref(),
                "index",
                &server_config.auth_service_url,
            );
            context.insert("has_previous", &posts.has_previous());
            context.insert("has_next", &posts.has_next());
            context.insert("posts", &posts);
            render_template(&tera, "posts/index.html", &context)
        }
        Err(err) => {
            log::error!("Failed to render posts index: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/posts/create")]
pub async fn create_post(
    user: AuthenticatedUser,
    session: Session,
    flash_messages: IncomingFlashMessages,
    repo: web::Data<DieselRepository>,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    match show_create_form_service(repo.get_ref()) {
        Ok(view) => {
            let (errors, old) = take_failed_input(&session);
            let mut context = base_context(
                &flash_messages,
                Some(&user),
                "create",
                &server_config.auth_service_url,
            );
            context.insert("all_categories", &view.all_categories);
            context.insert("errors", &errors);
            context.insert("old", &old.unwrap_or_default());
            render_template(&tera, "posts/create.html", &context)
        }
        Err(err) => {
            log::error!("Failed to render create form: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[post("/posts")]
pub async fn store_post(
    user: AuthenticatedUser,
    session: Session,
    repo: web::Data<DieselRepository>,
    storage: web::Data<LocalPublicStorage>,
    MultipartForm(form): MultipartForm<PostForm>,
) -> impl Responder {
    let input = form.into_input();
    let old = input.old_input();

    match store_post_service(input, &user, repo.get_ref(), storage.get_ref()) {
        Ok(target) => {
            FlashMessage::success("Post created.").send();
            redirect(&target.location())
        }
        Err(ServiceError::Validation(errors)) => {
            remember_failed_input(&session, &errors, &old);
            redirect(&Redirect::CreatePost.location())
        }
        Err(ServiceError::Form(message)) => {
            FlashMessage::error(message).send();
            redirect(&Redirect::CreatePost.location())
        }
        Err(err) => {
            log::error!("Failed to store post: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/posts/{post_id}")]
pub async fn show_post(
    post_id: web::Path<i32>,
    user: Option<AuthenticatedUser>,
    flash_messages: IncomingFlashMessages,
    repo: web::Data<DieselRepository>,
    storage: web::Data<LocalPublicStorage>,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    match show_post_service(
        post_id.into_inner(),
        user.as_ref(),
        repo.get_ref(),
        storage.get_ref(),
    ) {
        Ok(view) => {
            let mut context = base_context(
                &flash_messages,
                user.as_ref(),
                "show",
                &server_config.auth_service_url,
            );
            context.insert("post", &view.post);
            context.insert("author_name", &view.author_name);
            context.insert("can_edit", &view.can_edit);
            render_template(&tera, "posts/show.html", &context)
        }
        Err(ServiceError::NotFound) => HttpResponse::NotFound().finish(),
        Err(err) => {
            log::error!("Failed to render post: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/posts/{post_id}/edit")]
pub async fn edit_post(
    post_id: web::Path<i32>,
    user: AuthenticatedUser,
    session: Session,
    flash_messages: IncomingFlashMessages,
    repo: web::Data<DieselRepository>,
    storage: web::Data<LocalPublicStorage>,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let post_id = post_id.into_inner();

    match show_edit_form_service(post_id, &user, repo.get_ref(), storage.get_ref()) {
        Ok(view) => {
            let (errors, old) = take_failed_input(&session);
            let old = old.unwrap_or_else(|| OldInput {
                description: view.post.description.clone(),
                category: view
                    .selected_category_ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect(),
            });
            let mut context = base_context(
                &flash_messages,
                Some(&user),
                "edit",
                &server_config.auth_service_url,
            );
            context.insert("post", &view.post);
            context.insert("all_categories", &view.all_categories);
            context.insert("errors", &errors);
            context.insert("old", &old);
            render_template(&tera, "posts/edit.html", &context)
        }
        Err(ServiceError::Unauthorized) => {
            FlashMessage::error("You are not allowed to edit this post.").send();
            redirect(&show_redirect(post_id).location())
        }
        Err(ServiceError::NotFound) => HttpResponse::NotFound().finish(),
        Err(err) => {
            log::error!("Failed to render edit form: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[route("/posts/{post_id}", method = "PUT", method = "POST")]
pub async fn update_post(
    post_id: web::Path<i32>,
    user: AuthenticatedUser,
    session: Session,
    repo: web::Data<DieselRepository>,
    storage: web::Data<LocalPublicStorage>,
    MultipartForm(form): MultipartForm<PostForm>,
) -> impl Responder {
    let post_id = post_id.into_inner();
    let input = form.into_input();
    let old = input.old_input();

    match update_post_service(post_id, input, &user, repo.get_ref(), storage.get_ref()) {
        Ok(target) => {
            FlashMessage::success("Post updated.").send();
            redirect(&target.location())
        }
        Err(ServiceError::Validation(errors)) => {
            remember_failed_input(&session, &errors, &old);
            let target = PostId::new(post_id)
                .map(Redirect::EditPost)
                .unwrap_or(Redirect::Index);
            redirect(&target.location())
        }
        Err(ServiceError::Unauthorized) => {
            FlashMessage::error("You are not allowed to edit this post.").send();
            redirect(&show_redirect(post_id).location())
        }
        Err(ServiceError::NotFound) => HttpResponse::NotFound().finish(),
        Err(ServiceError::Form(message)) => {
            FlashMessage::error(message).send();
            redirect(&show_redirect(post_id).location())
        }
        Err(err) => {
            log::error!("Failed to update post: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[post("/posts/{post_id}/delete")]
pub async fn destroy_post(
    post_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    storage: web::Data<LocalPublicStorage>,
) -> impl Responder {
    let post_id = post_id.into_inner();

    match destroy_post_service(post_id, &user, repo.get_ref(), storage.get_ref()) {
        Ok(target) => {
            FlashMessage::success("Post deleted.").send();
            redirect(&target.location())
        }
        Err(ServiceError::Unauthorized) => {
            FlashMessage::error("You are not allowed to delete this post.").send();
            redirect(&show_redirect(post_id).location())
        }
        Err(ServiceError::NotFound) => HttpResponse::NotFound().finish(),
        Err(err) => {
            log::error!("Failed to delete post: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
