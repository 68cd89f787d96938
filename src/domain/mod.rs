pub mod calendar;
pub mod layout;
pub mod models;
