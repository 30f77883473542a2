mod room_event;
mod room_state;

pub use room_event::*;
pub use room_state::*;
