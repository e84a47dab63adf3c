// JSON-RPC control plane: registry methods over the daemon socket.

pub mod methods;
pub mod unix;
