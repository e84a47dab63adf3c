// Daemon control-plane protocol: JSON-RPC 2.0 envelopes and method names.

pub mod jsonrpc;
pub mod rpc_methods;
