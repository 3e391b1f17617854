#![deny(unsafe_code)]

pub mod database;
pub mod error;
pub mod history_file;
pub mod record;
pub mod settings;
pub mod sync;

pub use error::{Error, Result};
