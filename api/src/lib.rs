pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod events;
pub mod index;
pub mod openapi;
pub mod search;
pub mod sync_service;
pub mod tasks;
