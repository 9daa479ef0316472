//! # Google Calendar Provider
//!
//! Implements `ProviderClient` for the Google Calendar API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Event listing with `timeMin`/`timeMax` windows and page following
//! - Event create, patch and delete on a bound calendar
//! - Calendar discovery through the user's calendar list
//! - Normalization of events into `ExternalItem`
//!
//! The bearer credential is read from the broker's credential store on every
//! call; nothing is retried here.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleCalendarConnector;
pub use error::{GoogleCalendarError, Result};
pub use types::CalendarListEntry;
