// Consistent exit codes for the atelier CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error (including rejected workspace input)
//   10 = daemon not reachable
//   13 = daemon did not answer in time

use std::process;

use serde_json::Value;

const JSONRPC_INVALID_PARAMS: i64 = -32602;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    DaemonDown = 10,
    Timeout = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(rpc_err) = cause.downcast_ref::<RpcError>() {
                return Self::from_rpc_code(rpc_err.code);
            }
            if cause.downcast_ref::<crate::client::DaemonUnavailable>().is_some() {
                return Self::DaemonDown;
            }
            if cause.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
                return Self::Timeout;
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound => {
                        Self::DaemonDown
                    }
                    std::io::ErrorKind::TimedOut => Self::Timeout,
                    _ => Self::Error,
                };
            }
        }

        Self::Error
    }

    /// Map a JSON-RPC error code to an exit code.
    pub fn from_rpc_code(code: i64) -> Self {
        match code {
            JSONRPC_INVALID_PARAMS => Self::Usage,
            _ => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

/// A JSON-RPC error returned by the daemon, embedded in an `anyhow::Error`
/// chain.
#[derive(Debug)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "daemon rejected the request ({}): {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
