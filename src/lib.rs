// src/lib.rs

//! Catalog archive library
//!
//! Crawls a namespaced function catalog on a fixed cadence, stores every
//! capture as an incremental backup record, and answers read queries over
//! the reconstructed latest state and its history.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
