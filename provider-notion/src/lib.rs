//! # Notion Provider
//!
//! Implements `ProviderClient` for the Notion API (version `2022-06-28`),
//! treating the pages of a task database as tasks.
//!
//! Expected database properties:
//! - `Name` (title; `Title` is accepted when reading)
//! - `Status` (select), defaults to "Not Started" when unset
//! - `Priority` (select), defaults to "Medium" when unset
//! - `Due Date` (date)
//! - `Description` (rich text)
//!
//! Deleting a page archives it, which is what the Notion UI does too.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::NotionConnector;
pub use error::{NotionError, Result};
pub use types::NotionDatabase;
