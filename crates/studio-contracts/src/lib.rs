pub mod chat;
pub mod config;
pub mod events;
pub mod gallery;
pub mod models;
pub mod tasks;
