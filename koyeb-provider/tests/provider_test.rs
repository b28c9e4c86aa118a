//! End-to-end provider tests against a wiremock Koyeb API

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use koyeb_client::{ClientConfig, KoyebClient};
use koyeb_core::provider::Provider;
use koyeb_core::resource::{Resource, ResourceId, Value};
use koyeb_provider::{KoyebProvider, ProviderConfig};

const APP_ID: &str = "0b6c3e52-2d1f-4c55-9d0b-6a3c1f2e4d10";
const SERVICE_ID: &str = "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d";
const DEPLOYMENT_ID: &str = "5e6f7a8b-9c0d-4e1f-a2b3-c4d5e6f7a8b9";
const DOMAIN_ID: &str = "9f8e7d6c-5b4a-4392-8170-6f5e4d3c2b1a";
const SECRET_ID: &str = "1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5e";
const VOLUME_ID: &str = "2b3c4d5e-6f7a-4b8c-9d0e-1f2a3b4c5d6e";

fn provider_for(server: &MockServer) -> KoyebProvider {
    let config = ClientConfig::new("test-token").with_api_url(server.uri());
    KoyebProvider::new(KoyebClient::new(config).unwrap()).with_config(ProviderConfig {
        wait_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(10),
    })
}

fn app_json(status: &str) -> serde_json::Value {
    json!({"id": APP_ID, "name": "shop", "organization_id": "org-1", "status": status})
}

#[tokio::test]
async fn create_app_reads_back_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/apps"))
        .and(body_json(json!({"name": "shop"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"app": app_json("STARTING")})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/apps/{}", APP_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"app": app_json("HEALTHY")})))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let resource = Resource::new("app", "shop").with_attribute("name", "shop");
    let state = provider.create(&resource).await.unwrap();

    assert!(state.exists);
    assert_eq!(state.identifier.as_deref(), Some(APP_ID));
    assert_eq!(state.get_str("status"), Some("HEALTHY"));
    assert_eq!(state.get_str("organization_id"), Some("org-1"));
}

#[tokio::test]
async fn create_app_rejects_short_name_without_calling_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let resource = Resource::new("app", "tiny").with_attribute("name", "ab");
    let err = provider.create(&resource).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "[koyeb_app.tiny] Attribute 'name' must be between 3 and 23 characters, got 2"
    );
}

#[tokio::test]
async fn read_missing_object_is_not_found_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/volumes/{}", VOLUME_ID)))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let state = provider
        .read(&ResourceId::new("volume", "data"), Some(VOLUME_ID))
        .await
        .unwrap();
    assert!(!state.exists);
}

#[tokio::test]
async fn read_without_identifier_skips_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let state = provider
        .read(&ResourceId::new("app", "shop"), None)
        .await
        .unwrap();
    assert!(!state.exists);
}

#[tokio::test]
async fn read_app_accepts_a_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apps": [app_json("HEALTHY")],
            "has_next": false
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/apps/{}", APP_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"app": app_json("HEALTHY")})))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let state = provider
        .read(&ResourceId::new("app", "shop"), Some("shop"))
        .await
        .unwrap();
    assert_eq!(state.identifier.as_deref(), Some(APP_ID));
}

#[tokio::test]
async fn create_service_waits_for_healthy_deployment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apps": [app_json("HEALTHY")],
            "has_next": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/services"))
        .and(body_json(json!({
            "app_id": APP_ID,
            "definition": {"name": "api", "regions": ["fra"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "service": {
                "id": SERVICE_ID,
                "name": "api",
                "app_id": APP_ID,
                "latest_deployment_id": DEPLOYMENT_ID
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/deployments/{}", DEPLOYMENT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deployment": {"id": DEPLOYMENT_ID, "status": "PROVISIONING"}
        })))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/deployments/{}", DEPLOYMENT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deployment": {"id": DEPLOYMENT_ID, "status": "HEALTHY"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/services/{}", SERVICE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "service": {
                "id": SERVICE_ID,
                "name": "api",
                "app_id": APP_ID,
                "status": "HEALTHY",
                "latest_deployment_id": DEPLOYMENT_ID
            }
        })))
        .mount(&server)
        .await;

    let mut definition = std::collections::HashMap::new();
    definition.insert("name".to_string(), Value::from("api"));
    definition.insert(
        "regions".to_string(),
        Value::List(vec![Value::from("fra")]),
    );
    let resource = Resource::new("service", "api")
        .with_attribute("app_name", "shop")
        .with_attribute("definition", Value::Map(definition));

    let provider = provider_for(&server);
    let state = provider.create(&resource).await.unwrap();

    assert_eq!(state.identifier.as_deref(), Some(SERVICE_ID));
    assert_eq!(state.get_str("latest_deployment"), Some(DEPLOYMENT_ID));
    assert_eq!(state.get_str("status"), Some("HEALTHY"));
}

#[tokio::test]
async fn update_service_fails_when_deployment_errors() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("/v1/services/{}", SERVICE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "service": {"id": SERVICE_ID, "name": "api", "latest_deployment_id": DEPLOYMENT_ID}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/deployments/{}", DEPLOYMENT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deployment": {
                "id": DEPLOYMENT_ID,
                "status": "ERROR",
                "messages": ["Image", "not", "found"]
            }
        })))
        .mount(&server)
        .await;

    let mut definition = std::collections::HashMap::new();
    definition.insert("name".to_string(), Value::from("api"));
    let to = Resource::new("service", "api")
        .with_attribute("app_name", APP_ID)
        .with_attribute("definition", Value::Map(definition));

    let provider = provider_for(&server);
    let id = ResourceId::new("service", "api");
    let from = koyeb_core::resource::State::not_found(id.clone());
    let err = provider
        .update(&id, SERVICE_ID, &from, &to)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        format!(
            "[koyeb_service.api] Deployment {} finished with status ERROR: Image not found",
            DEPLOYMENT_ID
        )
    );
}

#[tokio::test]
async fn update_app_is_not_supported() {
    let server = MockServer::start().await;
    let provider = provider_for(&server);
    let id = ResourceId::new("app", "shop");
    let from = koyeb_core::resource::State::not_found(id.clone());
    let to = Resource::new("app", "shop").with_attribute("name", "shop-2");

    let err = provider
        .update(&id, APP_ID, &from, &to)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "[koyeb_app.shop] Update not supported for app, delete and recreate"
    );
}

#[tokio::test]
async fn delete_app_waits_until_gone() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("/v1/apps/{}", APP_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/apps/{}", APP_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"app": app_json("DELETING")})))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/apps/{}", APP_ID)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    provider
        .delete(&ResourceId::new("app", "shop"), APP_ID)
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_stops_waiting_when_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("/v1/services/{}", SERVICE_ID)))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/services/{}", SERVICE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "service": {"id": SERVICE_ID, "name": "api", "status": "DELETING"}
        })))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let provider = provider_for(&server).with_cancellation(cancel);
    let err = provider
        .delete(&ResourceId::new("service", "api"), SERVICE_ID)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        format!(
            "[koyeb_service.api] Waiting for service {} was cancelled",
            SERVICE_ID
        )
    );
}

#[tokio::test]
async fn import_domain_by_name_backfills_app_name() {
    let server = MockServer::start().await;
    let domain = json!({
        "id": DOMAIN_ID,
        "name": "example.com",
        "app_id": APP_ID,
        "type": "CUSTOM",
        "status": "ACTIVE"
    });
    Mock::given(method("GET"))
        .and(path("/v1/domains"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "domains": [domain.clone()],
            "has_next": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/domains/{}", DOMAIN_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"domain": domain})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/apps/{}", APP_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"app": app_json("HEALTHY")})))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let state = provider
        .import(&ResourceId::new("domain", "main"), "example.com")
        .await
        .unwrap();

    assert_eq!(state.identifier.as_deref(), Some(DOMAIN_ID));
    assert_eq!(state.get_str("app_name"), Some("shop"));
    assert_eq!(state.get_str("type"), Some("CUSTOM"));
}

#[tokio::test]
async fn import_unknown_name_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "secrets": [],
            "has_next": false
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let err = provider
        .import(&ResourceId::new("secret", "db"), "db-password")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "[koyeb_secret.db] secret \"db-password\" not found"
    );
}

#[tokio::test]
async fn import_volume_requires_an_id() {
    let server = MockServer::start().await;
    let provider = provider_for(&server);
    let err = provider
        .import(&ResourceId::new("volume", "data"), "data")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "[koyeb_volume.data] volume \"data\" can only be imported by ID"
    );
}

#[tokio::test]
async fn read_secret_reveals_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/secrets/{}", SECRET_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "secret": {"id": SECRET_ID, "name": "db-password", "type": "SIMPLE"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/secrets/{}/reveal", SECRET_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": "hunter2"})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let state = provider
        .read(&ResourceId::new("secret", "db"), Some(SECRET_ID))
        .await
        .unwrap();
    assert_eq!(state.get_str("value"), Some("hunter2"));
    assert_eq!(state.get_str("type"), Some("SIMPLE"));
}

#[tokio::test]
async fn create_volume_applies_default_type() {
    let server = MockServer::start().await;
    let volume = json!({
        "id": VOLUME_ID,
        "name": "data",
        "region": "fra",
        "max_size": 10,
        "status": "PERSISTENT_VOLUME_STATUS_AVAILABLE"
    });
    Mock::given(method("POST"))
        .and(path("/v1/volumes"))
        .and(body_json(json!({
            "name": "data",
            "volume_type": "PERSISTENT_VOLUME_BACKING_STORE_LOCAL_BLK",
            "max_size": 10,
            "region": "fra"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"volume": volume.clone()})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/volumes/{}", VOLUME_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"volume": volume})))
        .mount(&server)
        .await;

    let resource = Resource::new("volume", "data")
        .with_attribute("name", "data")
        .with_attribute("region", "fra")
        .with_attribute("max_size", 10i64);

    let provider = provider_for(&server);
    let state = provider.create(&resource).await.unwrap();
    assert_eq!(state.attributes.get("max_size"), Some(&Value::Int(10)));
    assert_eq!(state.attributes.get("read_only"), Some(&Value::Bool(false)));
}
