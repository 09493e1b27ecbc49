pub mod connection;
pub mod fanout;
