//! Tweeters live dashboard
//!
//! Polls an object store for the day's bird occurrence and device message
//! CSVs, derives an hour-of-day histogram and a message table, and serves
//! them as a self-refreshing web page.

pub mod config;
pub mod logging;
pub mod module;
pub mod net;
pub mod service;
pub mod storage;
