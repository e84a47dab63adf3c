use std::sync::Arc;

use atelier_common::protocol::jsonrpc::{
    Request, RequestId, Response, RpcError, INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR,
};
use atelier_common::protocol::rpc_methods::{
    DAEMON_SHUTDOWN, RPC_PING, WORKSPACE_CREATE, WORKSPACE_GET, WORKSPACE_GET_BY_PUBLISH_TARGET,
    WORKSPACE_LIST, WORKSPACE_REMOVE, WORKSPACE_SET,
};
use atelier_common::types::{OwnerId, WorkspacePatch, WorkspaceRecord};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::warn;

use crate::registry::{RegistryError, WorkspaceRegistry};

#[derive(Clone)]
pub struct RpcServerState {
    registry: Arc<WorkspaceRegistry>,
    owner_id: OwnerId,
    shutdown_notifier: Option<broadcast::Sender<()>>,
}

impl RpcServerState {
    pub fn new(registry: Arc<WorkspaceRegistry>, owner_id: OwnerId) -> Self {
        Self { registry, owner_id, shutdown_notifier: None }
    }

    pub fn with_shutdown_notifier(mut self, shutdown_notifier: broadcast::Sender<()>) -> Self {
        self.shutdown_notifier = Some(shutdown_notifier);
        self
    }

    pub fn registry(&self) -> &Arc<WorkspaceRegistry> {
        &self.registry
    }

    fn owner(&self, requested: Option<OwnerId>) -> OwnerId {
        requested.unwrap_or(self.owner_id)
    }
}

// ── Params ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct WorkspaceListParams {
    #[serde(default)]
    owner_id: Option<OwnerId>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceGetParams {
    #[serde(default)]
    owner_id: Option<OwnerId>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct WorkspaceGetByPublishTargetParams {
    #[serde(default)]
    owner_id: Option<OwnerId>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct WorkspaceSetParams {
    #[serde(default)]
    owner_id: Option<OwnerId>,
    name: String,
    #[serde(default)]
    patch: WorkspacePatch,
}

#[derive(Debug, Default, Deserialize)]
struct WorkspaceCreateParams {
    #[serde(default)]
    owner_id: Option<OwnerId>,
    #[serde(default)]
    patch: WorkspacePatch,
}

#[derive(Debug, Deserialize)]
struct WorkspaceRemoveParams {
    #[serde(default)]
    owner_id: Option<OwnerId>,
    name: String,
}

// ── Dispatch ────────────────────────────────────────────────────────

pub async fn handle_raw_request(raw: &[u8], state: &RpcServerState) -> Response {
    let request = match serde_json::from_slice::<Request>(raw) {
        Ok(request) => request,
        Err(error) => {
            return Response::error(
                RequestId::Null,
                RpcError {
                    code: PARSE_ERROR,
                    message: "Parse error".to_string(),
                    data: Some(json!({ "reason": error.to_string() })),
                },
            );
        }
    };

    if request.jsonrpc != "2.0" {
        return Response::error(
            request.id,
            RpcError { code: INVALID_REQUEST, message: "Invalid Request".to_string(), data: None },
        );
    }

    dispatch_request(request, state).await
}

pub async fn dispatch_request(request: Request, state: &RpcServerState) -> Response {
    match request.method.as_str() {
        RPC_PING => Response::success(request.id, json!({ "ok": true })),
        DAEMON_SHUTDOWN => {
            if let Some(notifier) = &state.shutdown_notifier {
                let _ = notifier.send(());
            }
            Response::success(request.id, json!({ "ok": true }))
        }
        WORKSPACE_LIST => handle_workspace_list(request, state),
        WORKSPACE_GET => handle_workspace_get(request, state),
        WORKSPACE_GET_BY_PUBLISH_TARGET => handle_workspace_get_by_publish_target(request, state),
        WORKSPACE_SET => handle_workspace_set(request, state).await,
        WORKSPACE_CREATE => handle_workspace_create(request, state).await,
        WORKSPACE_REMOVE => handle_workspace_remove(request, state).await,
        _ => Response::error(
            request.id,
            RpcError {
                code: METHOD_NOT_FOUND,
                message: "Method not found".to_string(),
                data: None,
            },
        ),
    }
}

fn handle_workspace_list(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_optional_params::<WorkspaceListParams>(WORKSPACE_LIST, request.params)
    {
        Ok(params) => params,
        Err(reason) => return invalid_params_response(request.id, reason),
    };

    match state.registry.list(state.owner(params.owner_id)) {
        Ok(items) => {
            let total = items.len();
            Response::success(request.id, json!({ "items": items, "total": total }))
        }
        Err(error) => registry_error_response(request.id, WORKSPACE_LIST, error),
    }
}

fn handle_workspace_get(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<WorkspaceGetParams>(WORKSPACE_GET, request.params) {
        Ok(params) => params,
        Err(reason) => return invalid_params_response(request.id, reason),
    };

    match state.registry.get(state.owner(params.owner_id), &params.name) {
        Ok(workspace) => workspace_response(request.id, workspace),
        Err(error) => registry_error_response(request.id, WORKSPACE_GET, error),
    }
}

fn handle_workspace_get_by_publish_target(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<WorkspaceGetByPublishTargetParams>(
        WORKSPACE_GET_BY_PUBLISH_TARGET,
        request.params,
    ) {
        Ok(params) => params,
        Err(reason) => return invalid_params_response(request.id, reason),
    };

    match state.registry.get_by_publish_target(state.owner(params.owner_id), &params.url) {
        Ok(workspace) => workspace_response(request.id, workspace),
        Err(error) => registry_error_response(request.id, WORKSPACE_GET_BY_PUBLISH_TARGET, error),
    }
}

async fn handle_workspace_set(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<WorkspaceSetParams>(WORKSPACE_SET, request.params) {
        Ok(params) => params,
        Err(reason) => return invalid_params_response(request.id, reason),
    };

    match state.registry.set(state.owner(params.owner_id), &params.name, params.patch).await {
        Ok(workspace) => workspace_response(request.id, Some(workspace)),
        Err(error) => registry_error_response(request.id, WORKSPACE_SET, error),
    }
}

async fn handle_workspace_create(request: Request, state: &RpcServerState) -> Response {
    let params =
        match parse_optional_params::<WorkspaceCreateParams>(WORKSPACE_CREATE, request.params) {
            Ok(params) => params,
            Err(reason) => return invalid_params_response(request.id, reason),
        };

    match state.registry.create(state.owner(params.owner_id), params.patch).await {
        Ok(workspace) => workspace_response(request.id, Some(workspace)),
        Err(error) => registry_error_response(request.id, WORKSPACE_CREATE, error),
    }
}

async fn handle_workspace_remove(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<WorkspaceRemoveParams>(WORKSPACE_REMOVE, request.params) {
        Ok(params) => params,
        Err(reason) => return invalid_params_response(request.id, reason),
    };

    match state.registry.remove(state.owner(params.owner_id), &params.name).await {
        Ok(removed) => Response::success(request.id, json!({ "removed": removed })),
        Err(error) => registry_error_response(request.id, WORKSPACE_REMOVE, error),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T, String> {
    let Some(params) = params else {
        return Err(format!("{method} requires params"));
    };
    serde_json::from_value(params)
        .map_err(|error| format!("failed to decode {method} params: {error}"))
}

fn parse_optional_params<T: DeserializeOwned + Default>(
    method: &str,
    params: Option<Value>,
) -> Result<T, String> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(params) => parse_params(method, Some(params)),
    }
}

fn workspace_response(request_id: RequestId, workspace: Option<WorkspaceRecord>) -> Response {
    Response::success(request_id, json!({ "workspace": workspace }))
}

fn registry_error_response(request_id: RequestId, method: &str, error: RegistryError) -> Response {
    if error.is_validation() {
        return invalid_params_response(request_id, error.to_string());
    }

    warn!(method, error = %error, "registry operation failed");
    Response::error(
        request_id,
        RpcError { code: INTERNAL_ERROR, message: error.to_string(), data: None },
    )
}

fn invalid_params_response(request_id: RequestId, reason: String) -> Response {
    Response::error(request_id, RpcError::invalid_params(reason))
}

#[cfg(test)]
mod tests {
    use atelier_common::protocol::jsonrpc::INVALID_PARAMS;

    use super::*;
    use crate::store::workspaces::SqliteWorkspaceStore;

    fn state() -> RpcServerState {
        let store = Arc::new(SqliteWorkspaceStore::in_memory().expect("store should open"));
        RpcServerState::new(Arc::new(WorkspaceRegistry::new(store)), 0)
    }

    async fn call(state: &RpcServerState, method: &str, params: Option<Value>) -> Response {
        dispatch_request(Request::new(method, params, RequestId::Number(1)), state).await
    }

    fn result(response: Response) -> Value {
        assert!(response.error.is_none(), "expected success, got {:?}", response.error);
        response.result.expect("result should be present")
    }

    #[tokio::test]
    async fn ping_returns_ok() {
        let response = call(&state(), RPC_PING, None).await;
        assert_eq!(result(response), json!({ "ok": true }));
    }

    #[tokio::test]
    async fn daemon_shutdown_notifies_runtime_when_configured() {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let state = state().with_shutdown_notifier(shutdown_tx);

        let response = call(&state, DAEMON_SHUTDOWN, None).await;
        assert_eq!(result(response), json!({ "ok": true }));
        shutdown_rx.recv().await.expect("shutdown notification should be sent");
    }

    #[tokio::test]
    async fn set_then_get_roundtrips_through_rpc() {
        let state = state();
        let set = call(
            &state,
            WORKSPACE_SET,
            Some(json!({ "name": "garden", "patch": { "local_files_path": "/srv/garden" } })),
        )
        .await;
        assert_eq!(result(set)["workspace"]["name"], "garden");

        let get = call(&state, WORKSPACE_GET, Some(json!({ "name": "garden" }))).await;
        assert_eq!(result(get)["workspace"]["local_files_path"], "/srv/garden");

        let missing = call(&state, WORKSPACE_GET, Some(json!({ "name": "orchard" }))).await;
        assert_eq!(result(missing)["workspace"], Value::Null);
    }

    #[tokio::test]
    async fn list_defaults_to_configured_owner() {
        let state = state();
        for name in ["maple", "birch"] {
            call(&state, WORKSPACE_SET, Some(json!({ "name": name }))).await;
        }
        call(&state, WORKSPACE_SET, Some(json!({ "name": "cedar", "owner_id": 9 }))).await;

        let listed = result(call(&state, WORKSPACE_LIST, None).await);
        assert_eq!(listed["total"], 2);
        assert_eq!(listed["items"][0]["name"], "birch");
        assert_eq!(listed["items"][1]["name"], "maple");
    }

    #[tokio::test]
    async fn create_without_params_generates_a_name() {
        let state = state();
        let created = result(call(&state, WORKSPACE_CREATE, None).await);
        let name = created["workspace"]["name"].as_str().expect("name should be a string");
        assert!(atelier_common::name::is_valid_workspace_name(name));
    }

    #[tokio::test]
    async fn lookup_by_publish_target() {
        let state = state();
        let key = "ab".repeat(32);
        call(
            &state,
            WORKSPACE_SET,
            Some(json!({ "name": "garden", "patch": { "publish_target_url": key } })),
        )
        .await;

        let found = result(
            call(
                &state,
                WORKSPACE_GET_BY_PUBLISH_TARGET,
                Some(json!({ "url": format!("dat://{key}/") })),
            )
            .await,
        );
        assert_eq!(found["workspace"]["name"], "garden");
    }

    #[tokio::test]
    async fn remove_reports_whether_workspace_existed() {
        let state = state();
        call(&state, WORKSPACE_SET, Some(json!({ "name": "garden" }))).await;

        let first = result(call(&state, WORKSPACE_REMOVE, Some(json!({ "name": "garden" }))).await);
        assert_eq!(first["removed"], true);
        let second = result(call(&state, WORKSPACE_REMOVE, Some(json!({ "name": "garden" }))).await);
        assert_eq!(second["removed"], false);
    }

    #[tokio::test]
    async fn invalid_name_maps_to_invalid_params() {
        let response = call(&state(), WORKSPACE_SET, Some(json!({ "name": "Not Valid" }))).await;
        let error = response.error.expect("error should be present");
        assert_eq!(error.code, INVALID_PARAMS);
        assert!(error.data.unwrap()["reason"].as_str().unwrap().contains("invalid workspace name"));
    }

    #[tokio::test]
    async fn missing_params_map_to_invalid_params() {
        let response = call(&state(), WORKSPACE_GET, None).await;
        assert_eq!(response.error.expect("error should be present").code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let response = call(&state(), "workspace.publish", None).await;
        assert_eq!(response.error.expect("error should be present").code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let response = handle_raw_request(b"{not json", &state()).await;
        assert_eq!(response.id, RequestId::Null);
        assert_eq!(response.error.expect("error should be present").code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_invalid_request() {
        let raw = br#"{"jsonrpc":"1.0","method":"rpc.ping","id":3}"#;
        let response = handle_raw_request(raw, &state()).await;
        assert_eq!(response.error.expect("error should be present").code, INVALID_REQUEST);
    }
}
