mod controller;
mod intent;
mod room_view;

pub use controller::*;
pub use intent::*;
pub use room_view::*;
