//! Simple Storage Service: buckets are directories, objects are files, and
//! bucket/object metadata lives in CSV tables next to them.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod index;
pub mod models;
pub mod routes;
pub mod services;
