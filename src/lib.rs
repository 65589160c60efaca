pub mod config;
pub mod download;
pub mod error;
pub mod generator;
pub mod model;
pub mod poll;
pub mod service;
pub mod submit;
