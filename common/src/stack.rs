pub mod status;

pub use status::{needs_cleanup, Status, DELETE_COMPLETE, ROLLBACK_COMPLETE};
