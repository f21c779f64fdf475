//! Microsoft Graph source against a mock Graph and token endpoint.

use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idgraph_core::models::msft365;
use idgraph_core::source::fetch_all;
use idgraph_core::{EntitySource, IdGraphError};
use idgraph_msgraph::{MsGraphConfig, MsGraphSource};

const TENANT: &str = "tenant-1";
const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

fn config(server: &MockServer) -> MsGraphConfig {
    let mut config = MsGraphConfig::new(TENANT, "client-1", "secret-1");
    config.graph_endpoint = format!("{}/v1.0", server.uri());
    config.login_endpoint = server.uri();
    config.page_size = 2;
    config.max_retries = 2;
    config
}

fn odata(items: Vec<Value>, next_link: Option<String>) -> Value {
    let mut body = json!({ "value": items });
    if let Some(link) = next_link {
        body["@odata.nextLink"] = json!(link);
    }
    body
}

fn user(id: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.user",
        "id": id,
        "displayName": format!("User {id}"),
        "userPrincipalName": format!("{id}@contoso.com")
    })
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-1",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_users_follow_next_link_with_one_token() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param("$top", "2"))
        .and(query_param(
            "$select",
            "id,displayName,userPrincipalName,mail,jobTitle,department",
        ))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(
            vec![user("u1"), user("u2")],
            Some(format!("{}/v1.0/users?$skiptoken=page2", server.uri())),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param("$skiptoken", "page2"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(vec![user("u3")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let users = fetch_all(&source, msft365::USERS).await.unwrap();

    let ids: Vec<&str> = users.iter().map(|u| u["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3"]);
}

#[tokio::test]
async fn test_missing_administrative_units_are_empty() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/directory/administrativeUnits"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "Request_ResourceNotFound", "message": "not found"}
        })))
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let page = source
        .fetch_entities(msft365::ADMINISTRATIVE_UNITS, None)
        .await
        .unwrap();

    assert!(page.records.is_empty());
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_missing_users_collection_is_an_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let err = source.fetch_entities(msft365::USERS, None).await.unwrap_err();
    assert!(matches!(err, IdGraphError::SourceFetch { ref entity, .. } if entity == "users"));
}

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(
            vec![json!({"id": "g1", "displayName": "Engineering"})],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let page = source.fetch_entities(msft365::GROUPS, None).await.unwrap();
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    // One attempt plus max_retries.
    Mock::given(method("GET"))
        .and(path("/v1.0/devices"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let err = source.fetch_entities(msft365::DEVICES, None).await.unwrap_err();
    match err {
        IdGraphError::SourceFetch { entity, message } => {
            assert_eq!(entity, "devices");
            assert!(message.contains("503"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_device_owners_keep_only_users() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/devices/d1/registeredOwners"))
        .and(query_param("$select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(
            vec![
                json!({"@odata.type": "#microsoft.graph.user", "id": "u1"}),
                json!({"@odata.type": "#microsoft.graph.servicePrincipal", "id": "sp1"}),
            ],
            None,
        )))
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let owners = source
        .fetch_relationship_targets("d1", msft365::DEVICE_OWNERS)
        .await
        .unwrap();

    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0]["id"], "u1");
}

#[tokio::test]
async fn test_unit_members_split_by_type_across_pages() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/directory/administrativeUnits/ou1/members"))
        .and(query_param("$top", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(
            vec![
                json!({"@odata.type": "#microsoft.graph.user", "id": "u1"}),
                json!({"@odata.type": "#microsoft.graph.group", "id": "g1"}),
            ],
            Some(format!(
                "{}/v1.0/directory/administrativeUnits/ou1/members?$skiptoken=p2",
                server.uri()
            )),
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/directory/administrativeUnits/ou1/members"))
        .and(query_param("$skiptoken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(
            vec![json!({"@odata.type": "#microsoft.graph.user", "id": "u2"})],
            None,
        )))
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let users = source
        .fetch_relationship_targets("ou1", msft365::UNIT_USER_MEMBERS)
        .await
        .unwrap();
    let groups = source
        .fetch_relationship_targets("ou1", msft365::UNIT_GROUP_MEMBERS)
        .await
        .unwrap();

    let user_ids: Vec<&str> = users.iter().map(|u| u["id"].as_str().unwrap()).collect();
    assert_eq!(user_ids, vec!["u1", "u2"]);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["id"], "g1");
}

#[tokio::test]
async fn test_rejected_credentials_fail_the_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let err = source.fetch_entities(msft365::USERS, None).await.unwrap_err();
    match err {
        IdGraphError::SourceFetch { message, .. } => {
            assert!(message.contains("Authentication error"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_foreign_cursor_is_refused() {
    let server = MockServer::start().await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let err = source
        .fetch_entities(msft365::USERS, Some("https://attacker.example/v1.0/users"))
        .await
        .unwrap_err();
    assert!(matches!(err, IdGraphError::SourceFetch { .. }));
}

#[tokio::test]
async fn test_unknown_entity_type_is_refused() {
    let server = MockServer::start().await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let err = source.fetch_entities("applications", None).await.unwrap_err();
    assert!(err.to_string().contains("applications"));
}

#[tokio::test]
async fn test_foreign_member_next_link_is_refused() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(
            vec![user("u1")],
            Some("https://attacker.example/v1.0/groups/g1/members?$skiptoken=p2".to_string()),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let err = source
        .fetch_relationship_targets("g1", msft365::GROUP_MEMBERS)
        .await
        .unwrap_err();
    match err {
        IdGraphError::SourceFetch { entity, message } => {
            assert_eq!(entity, msft365::GROUP_MEMBERS);
            assert!(message.contains("refusing to follow nextLink"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_looping_member_next_link_fails() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let page = |token: &str| format!("{}/v1.0/groups/g1/members?$skiptoken={token}", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/members"))
        .and(query_param("$top", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(vec![user("u1")], Some(page("a")))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/members"))
        .and(query_param("$skiptoken", "a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(vec![user("u2")], Some(page("b")))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/members"))
        .and(query_param("$skiptoken", "b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(vec![user("u3")], Some(page("a")))))
        .expect(1)
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let err = source
        .fetch_relationship_targets("g1", msft365::GROUP_MEMBERS)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("nextLink repeated"), "{err}");
}

#[tokio::test]
async fn test_deleted_group_has_no_members() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups/gone/members"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "Request_ResourceNotFound", "message": "gone"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let members = source
        .fetch_relationship_targets("gone", msft365::GROUP_MEMBERS)
        .await
        .unwrap();
    assert!(members.is_empty());
}

#[tokio::test]
async fn test_member_page_failing_mid_collection_is_an_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/members"))
        .and(query_param("$top", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata(
            vec![user("u1")],
            Some(format!("{}/v1.0/groups/g1/members?$skiptoken=p2", server.uri())),
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/members"))
        .and(query_param("$skiptoken", "p2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = MsGraphSource::new(&config(&server)).unwrap();
    let err = source
        .fetch_relationship_targets("g1", msft365::GROUP_MEMBERS)
        .await
        .unwrap_err();
    assert!(matches!(err, IdGraphError::SourceFetch { .. }));
}
