mod relay_state;
mod ws_handler;

pub use relay_state::*;
pub use ws_handler::*;
