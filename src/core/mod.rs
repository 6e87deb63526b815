pub mod chat;
pub mod compose;
pub mod config;
pub mod constants;
pub mod message;
pub mod models;
pub mod session;
pub mod settings;
pub mod storage;
