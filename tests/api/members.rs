use mailchimp_sync::domain::MemberStatus;
use serde_json::json;
use serde_json::Value;
use wiremock::matchers::any;
use wiremock::matchers::body_json;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use crate::helpers::mailchimp_problem;
use crate::helpers::member_data;
use crate::helpers::spawn_app;
use crate::helpers::MEMBER_EMAIL;
use crate::helpers::MEMBER_HASH;

const LIST: &str = "fakeListId";

/// What MailChimp returns for a member
fn remote_member(email: &str) -> Value {
    let mut member = member_data();
    member["email_address"] = json!(email);
    member["id"] = json!("ignored");
    member["list_id"] = json!(LIST);
    member["stats"] = json!({"avg_open_rate": 0, "avg_click_rate": 0});
    member
}

#[tokio::test]
async fn create_member_posts_to_the_list() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path(format!("/lists/{LIST}/members")))
        .and(body_json(member_data()))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote_member(MEMBER_EMAIL)))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    // `list_id` in the body is ignored
    let mut data = member_data();
    data["list_id"] = json!("someOtherList");
    let resp = app.post(&format!("lists/{LIST}/members"), &data).await;
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["list_id"], LIST);
    assert_eq!(body["email_address"], MEMBER_EMAIL);
    assert_eq!(body["status"], "cleaned");
    assert_eq!(body["merge_fields"]["ADDRESS"]["city"], "Unknown");
    assert!(body["member_id"].as_str().is_some());
    assert_eq!(app.store.member_count(), 1);
}

#[tokio::test]
async fn create_member_rejects_invalid_data() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.mailchimp_server)
        .await;

    for (field, value, error) in [
        ("status", json!("archived"), "status"),
        ("email_address", json!("john.doe"), "email_address"),
        ("language", json!("eng"), "language"),
        ("vip", json!(1), "vip"),
        (
            "merge_fields",
            json!({"PHONE": "555-1234"}),
            "merge_fields.PHONE",
        ),
        (
            "merge_fields",
            json!({"BIRTHDAY": "13/45"}),
            "merge_fields.BIRTHDAY",
        ),
        (
            "merge_fields",
            json!({"ADDRESS": {"addr1": "New street"}}),
            "merge_fields.ADDRESS.zip",
        ),
    ] {
        let mut data = member_data();
        data[field] = value;
        let resp = app.post(&format!("lists/{LIST}/members"), &data).await;
        assert_eq!(resp.status().as_u16(), 400, "{error}");

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Invalid data given");
        assert!(body["errors"][error].is_array(), "{error}");
    }
    assert_eq!(app.store.member_count(), 0);
}

#[tokio::test]
async fn create_member_rolls_back_when_mail_chimp_fails() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path(format!("/lists/{LIST}/members")))
        .respond_with(ResponseTemplate::new(400).set_body_json(mailchimp_problem(
            400,
            "test4@noname.com is already a list member.",
        )))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let resp = app
        .post(&format!("lists/{LIST}/members"), &member_data())
        .await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["message"],
        "test4@noname.com is already a list member."
    );
    assert_eq!(app.store.member_count(), 0);
}

#[tokio::test]
async fn show_member_reads_through_by_subscriber_hash() {
    let app = spawn_app().await;
    Mock::given(method("GET"))
        .and(path(format!("/lists/{LIST}/members/{MEMBER_HASH}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote_member(MEMBER_EMAIL)))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let uri = format!("lists/{LIST}/members/{MEMBER_EMAIL}");
    let first: Value = app.get(&uri).await.json().await.unwrap();
    assert_eq!(first["email_address"], MEMBER_EMAIL);
    assert_eq!(first["list_id"], LIST);
    assert!(first.get("stats").is_none());
    assert_eq!(app.store.member_count(), 1);

    let second: Value = app.get(&uri).await.json().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn mixed_case_email_is_stored_lowercase_and_hashed() {
    let app = spawn_app().await;
    Mock::given(method("GET"))
        .and(path(format!("/lists/{LIST}/members/{MEMBER_HASH}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote_member("Test4@NoName.com")))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let resp = app
        .get(&format!("lists/{LIST}/members/Test4@NoName.com"))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["email_address"], MEMBER_EMAIL);

    // served locally, whatever the case
    let resp = app
        .get(&format!("lists/{LIST}/members/{MEMBER_EMAIL}"))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(app.store.members()[0].mail_chimp_id(), MEMBER_HASH);
}

#[tokio::test]
async fn show_unknown_member_is_not_found() {
    let app = spawn_app().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(mailchimp_problem(404, "Resource Not Found")),
        )
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let resp = app
        .get(&format!("lists/{LIST}/members/{MEMBER_EMAIL}"))
        .await;
    assert_eq!(resp.status().as_u16(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["message"],
        "MailChimpMember[test4@noname.com] not found in list fakeListId"
    );
}

#[tokio::test]
async fn show_member_rejects_invalid_remote_data() {
    let app = spawn_app().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"email_address": MEMBER_EMAIL, "status": "archived"})),
        )
        .mount(&app.mailchimp_server)
        .await;

    let resp = app
        .get(&format!("lists/{LIST}/members/{MEMBER_EMAIL}"))
        .await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Invalid data given during update data in DB"
    );
    assert_eq!(app.store.member_count(), 0);
}

#[tokio::test]
async fn show_members_reads_through_the_whole_list() {
    let app = spawn_app().await;
    Mock::given(method("GET"))
        .and(path(format!("/lists/{LIST}/members")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [remote_member(MEMBER_EMAIL), remote_member("john@doe.com")],
            "list_id": LIST,
            "total_items": 2,
        })))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let uri = format!("lists/{LIST}/members");
    let first: Value = app.get(&uri).await.json().await.unwrap();
    assert_eq!(first.as_array().unwrap().len(), 2);
    assert_eq!(first[1]["email_address"], "john@doe.com");
    assert_eq!(app.store.member_count(), 2);

    let second: Value = app.get(&uri).await.json().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn show_members_stores_nothing_if_one_is_invalid() {
    let app = spawn_app().await;
    let mut invalid = remote_member("john@doe.com");
    invalid["status"] = json!("archived");
    Mock::given(method("GET"))
        .and(path(format!("/lists/{LIST}/members")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [remote_member(MEMBER_EMAIL), invalid],
        })))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let resp = app.get(&format!("lists/{LIST}/members")).await;
    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(app.store.member_count(), 0);
}

#[tokio::test]
async fn show_members_of_unknown_list_is_not_found() {
    let app = spawn_app().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(mailchimp_problem(404, "Resource Not Found")),
        )
        .mount(&app.mailchimp_server)
        .await;

    let resp = app.get(&format!("lists/{LIST}/members")).await;
    assert_eq!(resp.status().as_u16(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "MailChimpList[fakeListId] not found");
}

#[tokio::test]
async fn show_members_served_locally() {
    let app = spawn_app().await;
    app.seed_member(LIST).await;
    app.seed_member("anotherList").await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.mailchimp_server)
        .await;

    let body: Value = app
        .get(&format!("lists/{LIST}/members"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn update_member_patches_the_previous_hash() {
    let app = spawn_app().await;
    let member = app.seed_member(LIST).await;

    let mut expected = member_data();
    expected["email_address"] = json!("john@doe.com");
    Mock::given(method("PATCH"))
        .and(path(format!("/lists/{LIST}/members/{MEMBER_HASH}")))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote_member("john@doe.com")))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let resp = app
        .patch(
            &format!("lists/{LIST}/members/{MEMBER_EMAIL}"),
            &json!({"email_address": "john@doe.com"}),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["email_address"], "john@doe.com");
    assert_eq!(body["member_id"], member.member_id.to_string());

    let stored = app.store.members();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].email_address(), "john@doe.com");
}

#[tokio::test]
async fn update_member_rejects_invalid_status() {
    let app = spawn_app().await;
    app.seed_member(LIST).await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.mailchimp_server)
        .await;

    let resp = app
        .patch(
            &format!("lists/{LIST}/members/{MEMBER_EMAIL}"),
            &json!({"status": "invalid"}),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid data given");
    assert!(body["errors"]["status"].is_array());

    let stored = app.store.members();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].attributes.status, MemberStatus::Cleaned);
}

#[tokio::test]
async fn update_member_rolls_back_when_mail_chimp_fails() {
    let app = spawn_app().await;
    app.seed_member(LIST).await;
    Mock::given(method("PATCH"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(mailchimp_problem(404, "Resource Not Found")),
        )
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let resp = app
        .patch(
            &format!("lists/{LIST}/members/{MEMBER_EMAIL}"),
            &json!({"vip": false}),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 400);
    assert!(app.store.members()[0].attributes.vip);
}

#[tokio::test]
async fn remove_member_deletes_by_subscriber_hash() {
    let app = spawn_app().await;
    app.seed_member(LIST).await;
    Mock::given(method("DELETE"))
        .and(path(format!("/lists/{LIST}/members/{MEMBER_HASH}")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let resp = app
        .delete(&format!("lists/{LIST}/members/{MEMBER_EMAIL}"))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!([]));
    assert_eq!(app.store.member_count(), 0);
}

#[tokio::test]
async fn remove_unknown_member_makes_no_remote_call() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&app.mailchimp_server)
        .await;

    let resp = app
        .delete(&format!("lists/{LIST}/members/{MEMBER_EMAIL}"))
        .await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn remove_member_rolls_back_when_mail_chimp_fails() {
    let app = spawn_app().await;
    app.seed_member(LIST).await;
    Mock::given(method("DELETE"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(mailchimp_problem(404, "Resource Not Found")),
        )
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let resp = app
        .delete(&format!("lists/{LIST}/members/{MEMBER_EMAIL}"))
        .await;
    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(app.store.member_count(), 1);
}
