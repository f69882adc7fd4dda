// src/sources/providers/mod.rs
pub mod fred;
pub mod news_rss;
pub mod sibling;
pub mod yahoo;
