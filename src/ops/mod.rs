pub mod focus;
pub mod interpret;
pub mod reminders;
pub mod reorder;
pub mod store;
pub mod ticker;
pub mod view;
