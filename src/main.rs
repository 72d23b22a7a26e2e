use std::path::Path;

use actix_files::Files;
use actix_identity::IdentityMiddleware;
use actix_session::SessionMiddleware;
use actix_session::storage::CookieSessionStore;
use actix_web::cookie::Key;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use actix_web_flash_messages::FlashMessagesFramework;
use actix_web_flash_messages::storage::CookieMessageStore;
use dotenvy::dotenv;
use tera::Tera;

use pushkind_posts::db::establish_connection_pool;
use pushkind_posts::models::config::ServerConfig;
use pushkind_posts::repository::DieselRepository;
use pushkind_posts::routes::posts::{
    create_post, destroy_post, edit_post, index, show_post, store_post, update_post,
};
use pushkind_posts::storage::LocalPublicStorage;

/// Cookie keys need at least 64 bytes of key material.
const MIN_SECRET_LEN: usize = 64;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
    let server_config = match ServerConfig::load(Path::new("config"), &app_env) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if server_config.secret.len() < MIN_SECRET_LEN {
        log::error!("Configured secret must be at least {MIN_SECRET_LEN} bytes long");
        std::process::exit(1);
    }
    let secret_key = Key::from(server_config.secret.as_bytes());

    let pool = match establish_connection_pool(&server_config.database_url) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    let tera = match Tera::new(&server_config.templates_dir) {
        Ok(t) => t,
        Err(e) => {
            log::error!("Parsing error(s): {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&server_config.storage.root) {
        log::error!(
            "Failed to create storage directory {}: {e}",
            server_config.storage.root
        );
        std::process::exit(1);
    }

    let repo = DieselRepository::new(pool);
    let storage = LocalPublicStorage::new(
        &server_config.storage.root,
        &server_config.storage.public_url,
    );

    let message_store = CookieMessageStore::builder(secret_key.clone()).build();
    let message_framework = FlashMessagesFramework::builder(message_store).build();

    let bind_address = (server_config.address.clone(), server_config.port);
    log::info!("Starting server at {}:{}", bind_address.0, bind_address.1);

    HttpServer::new(move || {
        App::new()
            .wrap(message_framework.clone())
            .wrap(IdentityMiddleware::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_secure(false)
                    .build(),
            )
            .wrap(Logger::default())
            .service(
                Files::new(
                    &server_config.storage.public_url,
                    &server_config.storage.root,
                )
                .prefer_utf8(true),
            )
            .service(index)
            .service(create_post)
            .service(store_post)
            .service(edit_post)
            .service(show_post)
            .service(update_post)
            .service(destroy_post)
            .app_data(web::Data::new(tera.clone()))
            .app_data(web::Data::new(repo.clone()))
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::new(server_config.clone()))
    })
    .bind(bind_address)?
    .run()
    .await
}
