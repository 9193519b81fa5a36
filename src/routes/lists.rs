use actix_web::web;
use actix_web::HttpResponse;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;

use crate::mailchimp_client::MailChimpClient;
use crate::persistence::Store;
use crate::sync::ListSync;
use crate::sync::SyncError;

/// `POST /mailchimp/lists`
///
/// # Request example
///
/// ```sh
///     curl -X POST -H 'Content-Type: application/json' \
///         -d @list.json http://127.0.0.1:8000/mailchimp/lists
/// ```
#[tracing::instrument(name = "Create list request", skip(body, store, mailchimp))]
pub async fn create_list(
    body: web::Json<Map<String, Value>>,
    store: web::Data<dyn Store>,
    mailchimp: web::Data<MailChimpClient>,
) -> Result<HttpResponse, SyncError> {
    let list = ListSync::new(store.get_ref(), &mailchimp)
        .create(&body)
        .await?;
    Ok(HttpResponse::Ok().json(list))
}

/// `GET /mailchimp/lists/{listId}`; `listId` is either the local id or the
/// MailChimp id
#[tracing::instrument(name = "Show list request", skip(store, mailchimp))]
pub async fn show_list(
    path: web::Path<String>,
    store: web::Data<dyn Store>,
    mailchimp: web::Data<MailChimpClient>,
) -> Result<HttpResponse, SyncError> {
    let list = ListSync::new(store.get_ref(), &mailchimp)
        .show(&path)
        .await?;
    Ok(HttpResponse::Ok().json(list))
}

/// `PATCH /mailchimp/lists/{listId}`
#[tracing::instrument(name = "Update list request", skip(body, store, mailchimp))]
pub async fn update_list(
    path: web::Path<String>,
    body: web::Json<Map<String, Value>>,
    store: web::Data<dyn Store>,
    mailchimp: web::Data<MailChimpClient>,
) -> Result<HttpResponse, SyncError> {
    let list = ListSync::new(store.get_ref(), &mailchimp)
        .update(&path, &body)
        .await?;
    Ok(HttpResponse::Ok().json(list))
}

/// `DELETE /mailchimp/lists/{listId}`; responds with `[]`
#[tracing::instrument(name = "Remove list request", skip(store, mailchimp))]
pub async fn remove_list(
    path: web::Path<String>,
    store: web::Data<dyn Store>,
    mailchimp: web::Data<MailChimpClient>,
) -> Result<HttpResponse, SyncError> {
    ListSync::new(store.get_ref(), &mailchimp)
        .remove(&path)
        .await?;
    Ok(HttpResponse::Ok().json(json!([])))
}
