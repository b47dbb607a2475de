//! Persistence layer: SeaORM entities plus the [`GuardianStore`] facade
//! every other crate goes through. SQLite (WAL) for single-node
//! deployments; the schema also runs on Postgres.

pub mod entities;
pub mod store;


pub use store::{AlertInsert, GuardianStore, InsertOutcome};
