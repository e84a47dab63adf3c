use std::sync::Arc;

use atelier_common::protocol::jsonrpc::{
    Request, RequestId, Response, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use atelier_common::protocol::rpc_methods::{IMPLEMENTED_METHODS, PLANNED_METHODS};
use atelier_daemon::registry::WorkspaceRegistry;
use atelier_daemon::rpc::methods::{handle_raw_request, RpcServerState};
use atelier_daemon::store::workspaces::SqliteWorkspaceStore;
use serde_json::{json, Value};

fn state() -> RpcServerState {
    let store = SqliteWorkspaceStore::in_memory().expect("in-memory store should open");
    RpcServerState::new(Arc::new(WorkspaceRegistry::new(Arc::new(store))), 1)
}

async fn call_raw(state: &RpcServerState, request: &Request) -> Response {
    let raw = serde_json::to_vec(request).expect("request should serialize");
    handle_raw_request(&raw, state).await
}

async fn call(state: &RpcServerState, method: &str, params: Value) -> Response {
    call_raw(state, &Request::new(method, Some(params), RequestId::Number(1))).await
}

#[tokio::test]
async fn implemented_methods_are_registered_in_dispatch() {
    let state = state();

    for method in IMPLEMENTED_METHODS {
        let request = Request::new(*method, None, RequestId::String((*method).to_string()));
        let response = call_raw(&state, &request).await;

        assert_eq!(response.id, RequestId::String((*method).to_string()));
        if let Some(error) = response.error {
            assert_ne!(error.code, METHOD_NOT_FOUND, "{method} should be dispatched");
        }
    }
}

#[tokio::test]
async fn planned_methods_are_not_dispatched() {
    let state = state();
    for method in PLANNED_METHODS {
        let response = call(&state, method, json!({})).await;
        assert_eq!(response.error.expect("planned method should fail").code, METHOD_NOT_FOUND);
    }
}

#[tokio::test]
async fn malformed_payloads_map_to_protocol_errors() {
    let state = state();

    let parse = handle_raw_request(b"{not json", &state).await;
    assert_eq!(parse.id, RequestId::Null);
    assert_eq!(parse.error.unwrap().code, PARSE_ERROR);

    let wrong_version = handle_raw_request(
        br#"{"jsonrpc":"1.0","method":"rpc.ping","id":3}"#,
        &state,
    )
    .await;
    assert_eq!(wrong_version.id, RequestId::Number(3));
    assert_eq!(wrong_version.error.unwrap().code, INVALID_REQUEST);
}

#[tokio::test]
async fn registry_lifecycle_over_json_rpc() {
    let state = state();

    let created = call(
        &state,
        "workspace.create",
        json!({ "patch": { "name": "garden", "local_files_path": "/srv/garden" } }),
    )
    .await;
    assert!(created.error.is_none(), "create should succeed: {created:?}");
    assert_eq!(created.result.unwrap()["workspace"]["name"], "garden");

    let published = call(
        &state,
        "workspace.set",
        json!({
            "name": "garden",
            "patch": { "publish_target_url": format!("dat://{}/", "a".repeat(64)) }
        }),
    )
    .await;
    let record = published.result.expect("set should succeed")["workspace"].clone();
    assert_eq!(record["publish_target_url"], format!("dat://{}", "a".repeat(64)));
    assert_eq!(record["local_files_path"], "/srv/garden");

    let by_target = call(
        &state,
        "workspace.get_by_publish_target",
        json!({ "url": format!("dat://{}/index.html?v=2", "a".repeat(64)) }),
    )
    .await;
    assert_eq!(by_target.result.unwrap()["workspace"]["name"], "garden");

    let renamed = call(
        &state,
        "workspace.set",
        json!({ "name": "garden", "patch": { "name": "orchard" } }),
    )
    .await;
    assert_eq!(renamed.result.unwrap()["workspace"]["name"], "orchard");

    let listed = call(&state, "workspace.list", json!({})).await.result.unwrap();
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["name"], "orchard");

    let old = call(&state, "workspace.get", json!({ "name": "garden" })).await;
    assert_eq!(old.result.unwrap()["workspace"], Value::Null);

    let removed = call(&state, "workspace.remove", json!({ "name": "orchard" })).await;
    assert_eq!(removed.result.unwrap()["removed"], true);
    let again = call(&state, "workspace.remove", json!({ "name": "orchard" })).await;
    assert_eq!(again.result.unwrap()["removed"], false);
}

#[tokio::test]
async fn validation_failures_are_invalid_params() {
    let state = state();

    let bad_name = call(&state, "workspace.set", json!({ "name": "bad name!", "patch": {} })).await;
    assert_eq!(bad_name.error.unwrap().code, INVALID_PARAMS);

    let relative = call(
        &state,
        "workspace.create",
        json!({ "patch": { "local_files_path": "relative/dir" } }),
    )
    .await;
    assert_eq!(relative.error.unwrap().code, INVALID_PARAMS);

    let missing = call(&state, "workspace.get", json!({})).await;
    assert_eq!(missing.error.unwrap().code, INVALID_PARAMS);
}

#[tokio::test]
async fn owners_are_isolated() {
    let state = state();

    call(&state, "workspace.set", json!({ "owner_id": 2, "name": "shared", "patch": {} })).await;

    let own = call(&state, "workspace.list", json!({})).await.result.unwrap();
    assert_eq!(own["total"], 0);
    let other = call(&state, "workspace.list", json!({ "owner_id": 2 })).await.result.unwrap();
    assert_eq!(other["total"], 1);
}
