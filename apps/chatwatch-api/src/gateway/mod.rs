pub mod events;
pub mod fanout;
pub mod history;
pub mod server;
