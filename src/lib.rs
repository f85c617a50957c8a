// src/lib.rs

//! Planning Center to static-site exporter library

pub mod error;
pub mod jsonapi;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
