pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod pages;
pub mod routes;
pub mod session;
pub mod store;
pub mod uploads;
pub mod workflow;
