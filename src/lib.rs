pub mod aggregate;
pub mod attachment;
pub mod builder;
pub mod config;
pub mod db;
pub mod environment;
pub mod errors;
pub mod geo;
pub mod io;
pub mod normalization;
pub mod pipeline;
pub mod routes;
pub mod store;
pub mod submission;
pub mod timezone;
pub mod upload;
pub mod writer;

/// The type of every generated row ID.
pub type Id = i32;
