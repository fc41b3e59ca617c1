//! HTTP engine client against a mock cluster

use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;
use taskhub_search::engine::{
    AliasAction, BulkOperation, ElasticClient, EngineConfig, EngineError, ErrorClass, HealthStatus,
    Refresh, SearchEngine,
};

fn client_for(urls: &[String]) -> ElasticClient {
    let config = EngineConfig {
        nodes: urls.to_vec(),
        max_retries: 1,
        retry_backoff_ms: 0,
        ..Default::default()
    };
    ElasticClient::new(config).unwrap()
}

#[tokio::test]
async fn test_health_is_parsed() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/_cluster/health/tasks_v1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"cluster_name":"taskhub","status":"yellow","number_of_nodes":1}"#)
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let status = client.health(Some("tasks_v1")).await.unwrap();
    assert_eq!(status, HealthStatus::Yellow);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_index_exists_maps_head_status() {
    let mut server = Server::new_async().await;
    server.mock("HEAD", "/tasks_v1").with_status(200).create_async().await;
    server.mock("HEAD", "/nope").with_status(404).create_async().await;

    let client = client_for(&[server.url()]);
    assert!(client.index_exists("tasks_v1").await.unwrap());
    assert!(!client.index_exists("nope").await.unwrap());
}

#[tokio::test]
async fn test_create_index_sends_settings_mappings_and_aliases() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/tasks_v2")
        .match_body(Matcher::Json(json!({
            "settings": {"index.number_of_shards": 1},
            "mappings": {"properties": {"title": {"type": "text"}}},
            "aliases": {"tasks": {}},
        })))
        .with_status(200)
        .with_body(r#"{"acknowledged":true,"shards_acknowledged":true,"index":"tasks_v2"}"#)
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let settings = json!({"index.number_of_shards": 1}).as_object().cloned().unwrap();
    let mappings = json!({"properties": {"title": {"type": "text"}}})
        .as_object()
        .cloned()
        .unwrap();
    client
        .create_index("tasks_v2", &settings, &mappings, &["tasks".to_string()])
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_bodies_are_decoded() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/nope")
        .with_status(404)
        .with_body(
            r#"{"error":{"type":"index_not_found_exception","reason":"no such index [nope]"},"status":404}"#,
        )
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let err = client.delete_index("nope").await.unwrap_err();
    match &err {
        EngineError::Api {
            status,
            error_type,
            reason,
        } => {
            assert_eq!(*status, 404);
            assert_eq!(error_type, "index_not_found_exception");
            assert!(reason.contains("nope"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.class(), ErrorClass::ClientShape);
}

#[tokio::test]
async fn test_alias_actions_go_in_one_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/_aliases")
        .match_body(Matcher::Json(json!({
            "actions": [
                {"remove": {"index": "tasks_v1", "alias": "tasks"}},
                {"add": {"index": "tasks_v2", "alias": "tasks"}},
            ]
        })))
        .with_status(200)
        .with_body(r#"{"acknowledged":true}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    client
        .update_aliases(&[
            AliasAction::remove("tasks_v1", "tasks"),
            AliasAction::add("tasks_v2", "tasks"),
        ])
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_aliases_collects_names() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/tasks_v1/_alias")
        .with_status(200)
        .with_body(r#"{"tasks_v1":{"aliases":{"tasks":{},"tasks-read":{}}}}"#)
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let aliases = client.get_aliases("tasks_v1").await.unwrap();
    assert_eq!(
        aliases.into_iter().collect::<Vec<_>>(),
        vec!["tasks".to_string(), "tasks-read".to_string()]
    );
}

#[tokio::test]
async fn test_alias_holders_lists_physical_indexes() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/_alias/tasks")
        .with_status(200)
        .with_body(r#"{"tasks_v1":{"aliases":{"tasks":{}}},"tasks_import":{"aliases":{"tasks":{}}}}"#)
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let holders = client.alias_holders("tasks").await.unwrap();
    assert_eq!(
        holders.into_iter().collect::<Vec<_>>(),
        vec!["tasks_import".to_string(), "tasks_v1".to_string()]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_alias_holders_empty_for_unknown_alias() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/_alias/tasks")
        .with_status(404)
        .with_body(r#"{"error":"alias [tasks] missing","status":404}"#)
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    assert!(client.alias_holders("tasks").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_settings_reads_entry_for_index() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/tasks_v1/_settings")
        .with_status(200)
        .with_body(
            r#"{"tasks_v1":{"settings":{"index":{"number_of_shards":"1","refresh_interval":"1s"}}}}"#,
        )
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let settings = client.get_settings("tasks_v1").await.unwrap();
    assert_eq!(settings["index"]["number_of_shards"], "1");
    assert_eq!(settings["index"]["refresh_interval"], "1s");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_settings_through_alias_uses_physical_entry() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/tasks/_settings")
        .with_status(200)
        .with_body(r#"{"tasks_v7":{"settings":{"index":{"number_of_replicas":"2"}}}}"#)
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let settings = client.get_settings("tasks").await.unwrap();
    assert_eq!(settings["index"]["number_of_replicas"], "2");
}

#[tokio::test]
async fn test_bulk_write_sends_ndjson_and_parses_items() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Regex(r"^/tasks/_bulk".to_string()))
        .match_query(Matcher::UrlEncoded("refresh".into(), "wait_for".into()))
        .match_header("content-type", "application/x-ndjson")
        .match_body(Matcher::Regex(r#"\{"index":\{"_id":"task-1"\}\}\n"#.to_string()))
        .with_status(200)
        .with_body(
            json!({
                "took": 5,
                "errors": true,
                "items": [
                    {"index": {"_id": "task-1", "status": 201}},
                    {"index": {"_id": "task-2", "status": 400,
                        "error": {"type": "mapper_parsing_exception", "reason": "bad date"}}},
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let ops = vec![
        BulkOperation::index(json!({"id": "task-1", "title": "One"})),
        BulkOperation::index(json!({"id": "task-2", "title": "Two", "due_date": "soon"})),
    ];
    let items = client.bulk_write("tasks", &ops, Refresh::WaitFor).await.unwrap();
    mock.assert_async().await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_success());
    assert!(!items[1].is_success());
    assert_eq!(
        items[1].error.as_ref().unwrap().error_type,
        "mapper_parsing_exception"
    );
}

#[tokio::test]
async fn test_search_response_is_normalized() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/tasks/_search")
        .match_body(Matcher::PartialJson(json!({"size": 10})))
        .with_status(200)
        .with_body(
            json!({
                "took": 7,
                "timed_out": false,
                "hits": {
                    "total": {"value": 42, "relation": "eq"},
                    "max_score": 3.5,
                    "hits": [
                        {"_index": "tasks_v1", "_id": "task-7", "_score": 3.5,
                         "_source": {"title": "Project alpha kickoff"}},
                        {"_index": "tasks_v1", "_id": "task-3", "_score": null,
                         "_source": {"title": "Alpha retro"}},
                    ]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let response = client
        .query("tasks", &json!({"size": 10}), Duration::from_secs(1))
        .await
        .unwrap();
    mock.assert_async().await;

    assert_eq!(response.total, 42);
    assert_eq!(response.took, 7);
    assert_eq!(response.hits.len(), 2);
    assert_eq!(response.hits[0].id, "task-7");
    assert_eq!(response.hits[0].score, Some(3.5));
    assert_eq!(response.hits[1].score, None);
}

#[tokio::test]
async fn test_legacy_numeric_total_is_accepted() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/tasks/_search")
        .with_status(200)
        .with_body(r#"{"took":1,"timed_out":true,"hits":{"total":3,"hits":[]}}"#)
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let response = client
        .query("tasks", &json!({}), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(response.total, 3);
    assert!(response.timed_out);
}

#[tokio::test]
async fn test_unavailable_node_is_retried_on_the_next() {
    let mut down = Server::new_async().await;
    let mut up = Server::new_async().await;
    let unavailable = down
        .mock("POST", "/tasks/_search")
        .with_status(503)
        .with_body(r#"{"error":{"type":"unavailable_shards_exception","reason":"busy"},"status":503}"#)
        .expect(1)
        .create_async()
        .await;
    let healthy = up
        .mock("POST", "/tasks/_search")
        .with_status(200)
        .with_body(r#"{"took":1,"timed_out":false,"hits":{"total":{"value":0},"hits":[]}}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&[down.url(), up.url()]);
    let response = client
        .query("tasks", &json!({}), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(response.total, 0);
    unavailable.assert_async().await;
    healthy.assert_async().await;
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/tasks/_search")
        .with_status(400)
        .with_body(r#"{"error":{"type":"parsing_exception","reason":"unknown query"},"status":400}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&[server.url()]);
    let err = client
        .query("tasks", &json!({}), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::ClientShape);
    assert_eq!(err.error_type(), Some("parsing_exception"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_api_key_header_is_sent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/_cluster/health")
        .match_header("authorization", "ApiKey c2VjcmV0")
        .with_status(200)
        .with_body(r#"{"status":"green"}"#)
        .create_async()
        .await;

    let config = EngineConfig {
        nodes: vec![server.url()],
        api_key: Some("c2VjcmV0".to_string()),
        ..Default::default()
    };
    let client = ElasticClient::new(config).unwrap();
    assert_eq!(client.health(None).await.unwrap(), HealthStatus::Green);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_node_discovery_replaces_configured_nodes() {
    let mut server = Server::new_async().await;
    let address = server.host_with_port();
    server
        .mock("GET", "/_nodes/http")
        .with_status(200)
        .with_body(
            json!({
                "nodes": {
                    "n1": {"http": {"publish_address": format!("es-data-1/{}", address)}},
                    "n2": {"name": "master-only"},
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&["http://localhost:1".to_string()]);
    // discovery itself goes to the configured node, which is unreachable here
    assert!(client.discover_nodes().await.is_err());

    let client = client_for(&[server.url()]);
    let nodes = client.discover_nodes().await.unwrap();
    assert_eq!(nodes, vec![format!("http://{}", address)]);
    assert_eq!(client.nodes(), nodes);
}
