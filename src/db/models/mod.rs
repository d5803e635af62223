pub mod event;
pub mod session;

pub use event::{Event, EventKind, NewEvent};
pub use session::{Session, SessionWithEvents};
