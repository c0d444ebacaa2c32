//! News Stash - personal content for a news reader
//!
//! This crate provides the per-user content layer of a news aggregator:
//! favorite articles (toggled by url), emoji-style reactions, and private
//! comments, served over a JSON HTTP API backed by SQLite.

pub mod config;
pub mod db;
pub mod routes;
