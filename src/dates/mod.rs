//! Date token resolution
//!
//! Turns symbolic date tokens (`yesterday`, `last_month`, `last_month_start`,
//! `last_month_end`) and explicit `YYYY-MM-DD` dates into start-of-day
//! timestamps on the local calendar.
//!
//! # Overview
//!
//! The dates module provides:
//! - `DateToken` - Parsed token
//! - `DateResolver` - Resolves tokens against a `Clock`
//! - `FetchWindow` - Resolved (after, before) pair sent to the helpdesk API

mod resolver;

pub use resolver::{
    format_timestamp, Bound, Clock, DateResolver, DateToken, FetchWindow, FixedClock, SystemClock,
};
