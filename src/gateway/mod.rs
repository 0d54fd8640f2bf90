pub mod server;

pub use server::{build_gate, build_router, shutdown_signal, RelayServer, ServerState};
