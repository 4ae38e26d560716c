//! Common library for the finance tracker
//!
//! This crate provides infrastructure shared by the services in the
//! workspace: PostgreSQL connectivity, schema migrations and the error
//! taxonomy every store reports.

pub mod database;
pub mod error;
