//! newsportal - A small news portal
//!
//! Posts written by authors, tagged with categories, listed newest first
//! and searchable by title, content, author, category, type and date.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
