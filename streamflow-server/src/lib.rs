//! StreamFlow station server.
//!
//! Resolves internet-radio station lists for the StreamFlow player: races
//! redundant directory mirrors, filters and ranks the results, and caches
//! them with a time-based expiry.

pub mod cache;
pub mod config;
pub mod directory;
pub mod mirror;
pub mod normalize;
pub mod station;
pub mod web;
