// RPC method name constants, mirrored in contracts/jsonrpc-methods.json.

// ── Daemon-internal ────────────────────────────────────────────────
pub const RPC_PING: &str = "rpc.ping";
pub const DAEMON_SHUTDOWN: &str = "daemon.shutdown";

// ── Workspace registry ─────────────────────────────────────────────
pub const WORKSPACE_LIST: &str = "workspace.list";
pub const WORKSPACE_GET: &str = "workspace.get";
pub const WORKSPACE_GET_BY_PUBLISH_TARGET: &str = "workspace.get_by_publish_target";
pub const WORKSPACE_SET: &str = "workspace.set";
pub const WORKSPACE_CREATE: &str = "workspace.create";
pub const WORKSPACE_REMOVE: &str = "workspace.remove";

/// All methods the daemon currently dispatches.
pub const IMPLEMENTED_METHODS: &[&str] = &[
    RPC_PING,
    DAEMON_SHUTDOWN,
    WORKSPACE_LIST,
    WORKSPACE_GET,
    WORKSPACE_GET_BY_PUBLISH_TARGET,
    WORKSPACE_SET,
    WORKSPACE_CREATE,
    WORKSPACE_REMOVE,
];

/// Methods acknowledged in the contract but served by external collaborators.
pub const PLANNED_METHODS: &[&str] = &[
    "workspace.list_changed_files",
    "workspace.diff",
    "workspace.publish",
    "workspace.revert",
];
