pub mod command;
pub mod time;
