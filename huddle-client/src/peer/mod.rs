mod manager;
mod peer_command;
mod session;
mod state;

pub use manager::*;
pub use peer_command::*;
pub use state::*;
