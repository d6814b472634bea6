pub mod config;
pub mod list;
pub mod prefs;
pub mod session;
pub mod task;

pub use config::*;
pub use list::*;
pub use prefs::*;
pub use session::*;
pub use task::*;
