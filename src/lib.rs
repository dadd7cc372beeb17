pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod policy;
pub mod schema;
pub mod tracking;

#[macro_use]
extern crate diesel;
