pub mod input;
pub mod resolve;
pub mod server;

pub use input::ServeConfig;
pub use server::{build_router, run_server, AppState};
