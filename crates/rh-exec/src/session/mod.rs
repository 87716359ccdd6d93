//! Session lifecycle

mod handle;
mod manager;

pub use handle::{Session, CLOSE_GRACE};
pub use manager::SessionManager;
