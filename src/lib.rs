// src/lib.rs

//! Static HTML site generation for git repositories.

pub mod config;
pub mod diff;
pub mod error;
pub mod index;
pub mod model;
pub mod pages;
pub mod renderer;
pub mod repo;
pub mod site;

pub use config::Config;
pub use error::{Error, Result};
pub use site::{run, BuildSummary};
