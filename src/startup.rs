use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::error::InternalError;
use actix_web::web;
use actix_web::web::Data;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_actix_web::TracingLogger;

use crate::configuration::DatabaseSettings;
use crate::configuration::Settings;
use crate::mailchimp_client::MailChimpClient;
use crate::persistence::MemoryStore;
use crate::persistence::PgStore;
use crate::persistence::Store;
use crate::routes::create_list;
use crate::routes::create_member;
use crate::routes::health_check;
use crate::routes::remove_list;
use crate::routes::remove_member;
use crate::routes::show_list;
use crate::routes::show_member;
use crate::routes::show_members;
use crate::routes::update_list;
use crate::routes::update_member;

/// Wrapper for actix's `Server` with access to the bound port
pub struct Application {
    /// Left private; use `get_port` to access
    port: u16,
    server: Server,
}

impl Application {
    /// Pick the store from `cfg.database`, then build the server.
    ///
    /// With Postgres, pending migrations are applied first, so the database
    /// must be reachable at startup.
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let store: Arc<dyn Store> = match cfg.database.in_memory {
            true => {
                tracing::info!("using in-memory store");
                Arc::new(MemoryStore::new())
            }
            false => {
                let store = PgStore::new(get_connection_pool(&cfg.database));
                store.migrate().await?;
                Arc::new(store)
            }
        };
        Self::build_with_store(cfg, store).await
    }

    /// Like `build`, but with a given store (e.g. one the caller wants to
    /// inspect afterwards)
    pub async fn build_with_store(
        cfg: Settings,
        store: Arc<dyn Store>,
    ) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(addr)?;
        // with port 0, the OS assigns a random port
        let port = listener.local_addr()?.port();

        let mailchimp = cfg.mailchimp.client()?;
        let server = run(listener, store, mailchimp)?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 { self.port }

    /// Consumes `self`; should be the final call (or passed to
    /// `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

pub fn get_connection_pool(db_cfg: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new().connect_lazy_with(db_cfg.connection())
}

/// Listens on an already bound `listener`. Declares all endpoints.
pub fn run(
    listener: TcpListener,
    store: Arc<dyn Store>,
    mailchimp: MailChimpClient,
) -> Result<Server, anyhow::Error> {
    // `Data` is an `Arc` internally; every worker gets a clone
    let store: Data<dyn Store> = Data::from(store);
    let mailchimp = Data::new(mailchimp);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(json_config())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/mailchimp")
                    .route("/lists", web::post().to(create_list))
                    .route("/lists/{listId}", web::get().to(show_list))
                    .route("/lists/{listId}", web::patch().to(update_list))
                    .route("/lists/{listId}", web::delete().to(remove_list))
                    .route("/lists/{listId}/members", web::get().to(show_members))
                    .route("/lists/{listId}/members", web::post().to(create_member))
                    .route(
                        "/lists/{listId}/members/{email}",
                        web::get().to(show_member),
                    )
                    .route(
                        "/lists/{listId}/members/{email}",
                        web::patch().to(update_member),
                    )
                    .route(
                        "/lists/{listId}/members/{email}",
                        web::delete().to(remove_member),
                    ),
            )
            .app_data(store.clone())
            .app_data(mailchimp.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Bodies that are not a JSON object get the same `{"message"}` shape as
/// every other client error.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|e, _req| {
        let response = HttpResponse::BadRequest().json(json!({"message": e.to_string()}));
        InternalError::from_response(e, response).into()
    })
}
