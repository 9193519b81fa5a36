use actix_web::web;
use actix_web::HttpResponse;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;

use crate::mailchimp_client::MailChimpClient;
use crate::persistence::Store;
use crate::sync::MemberSync;
use crate::sync::SyncError;

// `{listId}` is always the MailChimp list id

/// `GET /mailchimp/lists/{listId}/members`
#[tracing::instrument(name = "Show members request", skip(store, mailchimp))]
pub async fn show_members(
    path: web::Path<String>,
    store: web::Data<dyn Store>,
    mailchimp: web::Data<MailChimpClient>,
) -> Result<HttpResponse, SyncError> {
    let members = MemberSync::new(store.get_ref(), &mailchimp)
        .list(&path)
        .await?;
    Ok(HttpResponse::Ok().json(members))
}

/// `GET /mailchimp/lists/{listId}/members/{email}`
#[tracing::instrument(name = "Show member request", skip(store, mailchimp))]
pub async fn show_member(
    path: web::Path<(String, String)>,
    store: web::Data<dyn Store>,
    mailchimp: web::Data<MailChimpClient>,
) -> Result<HttpResponse, SyncError> {
    let (list_id, email) = path.into_inner();
    let member = MemberSync::new(store.get_ref(), &mailchimp)
        .show(&list_id, &email)
        .await?;
    Ok(HttpResponse::Ok().json(member))
}

/// `POST /mailchimp/lists/{listId}/members`
#[tracing::instrument(name = "Create member request", skip(body, store, mailchimp))]
pub async fn create_member(
    path: web::Path<String>,
    body: web::Json<Map<String, Value>>,
    store: web::Data<dyn Store>,
    mailchimp: web::Data<MailChimpClient>,
) -> Result<HttpResponse, SyncError> {
    let member = MemberSync::new(store.get_ref(), &mailchimp)
        .create(&path, &body)
        .await?;
    Ok(HttpResponse::Ok().json(member))
}

/// `PATCH /mailchimp/lists/{listId}/members/{email}`
#[tracing::instrument(name = "Update member request", skip(body, store, mailchimp))]
pub async fn update_member(
    path: web::Path<(String, String)>,
    body: web::Json<Map<String, Value>>,
    store: web::Data<dyn Store>,
    mailchimp: web::Data<MailChimpClient>,
) -> Result<HttpResponse, SyncError> {
    let (list_id, email) = path.into_inner();
    let member = MemberSync::new(store.get_ref(), &mailchimp)
        .update(&list_id, &email, &body)
        .await?;
    Ok(HttpResponse::Ok().json(member))
}

/// `DELETE /mailchimp/lists/{listId}/members/{email}`; responds with `[]`
#[tracing::instrument(name = "Remove member request", skip(store, mailchimp))]
pub async fn remove_member(
    path: web::Path<(String, String)>,
    store: web::Data<dyn Store>,
    mailchimp: web::Data<MailChimpClient>,
) -> Result<HttpResponse, SyncError> {
    let (list_id, email) = path.into_inner();
    MemberSync::new(store.get_ref(), &mailchimp)
        .remove(&list_id, &email)
        .await?;
    Ok(HttpResponse::Ok().json(json!([])))
}
