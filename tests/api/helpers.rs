use std::sync::Arc;

use mailchimp_sync::configuration::get_configuration;
use mailchimp_sync::domain::MailChimpList;
use mailchimp_sync::domain::MailChimpMember;
use mailchimp_sync::persistence::MemoryStore;
use mailchimp_sync::persistence::Store;
use mailchimp_sync::startup::Application;
use mailchimp_sync::telemetry::get_subscriber;
use mailchimp_sync::telemetry::init_subscriber;
use once_cell::sync::Lazy;
use serde_json::json;
use serde_json::Value;
use wiremock::MockServer;

/// Init the tracing subscriber once per test binary.
///
/// To opt in to verbose logging, use the env var `TEST_LOG`:
///
/// ```sh
///      TEST_LOG=true cargo test [test_name] | bunyan
/// ```
static TRACING: Lazy<()> = Lazy::new(|| {
    match std::env::var("TEST_LOG") {
        Ok(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::stdout);
            init_subscriber(subscriber);
        }
        Err(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::sink);
            init_subscriber(subscriber);
        }
    };
});

pub struct TestApp {
    pub addr: String,
    /// Shared with the running app
    pub store: MemoryStore,
    /// Stands in for the MailChimp API
    pub mailchimp_server: MockServer,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn get(
        &self,
        path: &str,
    ) -> reqwest::Response {
        self.api_client
            .get(format!("{}/mailchimp/{}", self.addr, path))
            .send()
            .await
            .expect("execute request")
    }

    pub async fn post(
        &self,
        path: &str,
        body: &Value,
    ) -> reqwest::Response {
        self.api_client
            .post(format!("{}/mailchimp/{}", self.addr, path))
            .json(body)
            .send()
            .await
            .expect("execute request")
    }

    pub async fn patch(
        &self,
        path: &str,
        body: &Value,
    ) -> reqwest::Response {
        self.api_client
            .patch(format!("{}/mailchimp/{}", self.addr, path))
            .json(body)
            .send()
            .await
            .expect("execute request")
    }

    pub async fn delete(
        &self,
        path: &str,
    ) -> reqwest::Response {
        self.api_client
            .delete(format!("{}/mailchimp/{}", self.addr, path))
            .send()
            .await
            .expect("execute request")
    }

    /// Store a list directly, bypassing MailChimp
    pub async fn seed_list(
        &self,
        mail_chimp_id: &str,
    ) -> MailChimpList {
        let mut list = MailChimpList::new(list_data().as_object().unwrap()).unwrap();
        list.set_mail_chimp_id(mail_chimp_id.to_string());
        let mut transaction = self.store.begin().await.unwrap();
        transaction.save_list(&list).await.unwrap();
        transaction.commit().await.unwrap();
        list
    }

    /// Store a member directly, bypassing MailChimp
    pub async fn seed_member(
        &self,
        list_id: &str,
    ) -> MailChimpMember {
        let member = MailChimpMember::new(list_id, member_data().as_object().unwrap()).unwrap();
        let mut transaction = self.store.begin().await.unwrap();
        transaction.save_member(&member).await.unwrap();
        transaction.commit().await.unwrap();
        member
    }
}

pub fn list_data() -> Value {
    json!({
        "name": "New list",
        "permission_reminder": "You signed up for updates on Greeks economy.",
        "email_type_option": false,
        "contact": {
            "company": "Doe Ltd.",
            "address1": "DoeStreet 1",
            "address2": "",
            "city": "Doesy",
            "state": "Doedoe",
            "zip": "1672-12",
            "country": "US",
            "phone": "55533344412"
        },
        "campaign_defaults": {
            "from_name": "John Doe",
            "from_email": "john@doe.com",
            "subject": "My new campaign!",
            "language": "US"
        },
        "visibility": "prv",
        "use_archive_bar": false,
        "notify_on_subscribe": "notify@loyaltycorp.com.au",
        "notify_on_unsubscribe": "notify@loyaltycorp.com.au"
    })
}

pub const MEMBER_EMAIL: &str = "test4@noname.com";

/// md5 of `MEMBER_EMAIL`
pub const MEMBER_HASH: &str = "85e9b73ae49cdc1f98873905c922f876";

pub fn member_data() -> Value {
    json!({
        "email_address": MEMBER_EMAIL,
        "status": "cleaned",
        "merge_fields": {
            "FNAME": "John",
            "LNAME": "Doe",
            "PHONE": "+12345678901",
            "ADDRESS": {
                "zip": "1234-56",
                "city": "Unknown",
                "addr1": "New street",
                "addr2": "",
                "state": "fake reg.",
                "country": "ZZ"
            },
            "BIRTHDAY": "12/01"
        },
        "language": "zz",
        "vip": true
    })
}

/// Body of a MailChimp error response
pub fn mailchimp_problem(
    status: u16,
    detail: &str,
) -> Value {
    json!({
        "type": "https://mailchimp.com/developer/marketing/docs/errors/",
        "title": "Invalid Resource",
        "status": status,
        "detail": detail,
    })
}

/// Spawn the app on a random port, with an in-memory store and MailChimp
/// replaced by a `MockServer`
pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let mailchimp_server = MockServer::start().await;

    let cfg = {
        let mut cfg = get_configuration().expect("failed to read configuration");
        cfg.database.in_memory = true;
        cfg.application.port = 0;
        cfg.mailchimp.base_url = mailchimp_server.uri();
        cfg.mailchimp.timeout_milliseconds = 2000;
        cfg
    };

    let store = MemoryStore::new();
    let app = Application::build_with_store(cfg, Arc::new(store.clone()))
        .await
        .expect("failed to build application");
    let addr = format!("http://localhost:{}", app.get_port());
    tokio::spawn(app.run_until_stopped());

    TestApp {
        addr,
        store,
        mailchimp_server,
        api_client: reqwest::Client::new(),
    }
}
