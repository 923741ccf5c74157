//! # Paycore Repository
//!
//! Concrete repository implementations (adapters) for the payment core.
//! This crate provides storage adapters that implement the `PaymentStore` port.

#[cfg(not(any(feature = "postgres", feature = "memory")))]
compile_error!("Enable a repo feature: `postgres` or `memory`.");

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
mod types;

#[cfg(feature = "memory")]
#[cfg(test)]
mod memory_tests;

#[cfg(feature = "memory")]
pub use memory::MemoryRepo;
#[cfg(feature = "postgres")]
pub use postgres::PostgresRepo;

/// Repository used by the server binary.
#[cfg(feature = "postgres")]
pub type Repo = PostgresRepo;
#[cfg(all(feature = "memory", not(feature = "postgres")))]
pub type Repo = MemoryRepo;

/// Build and initialize a repository from a database URL.
///
/// This function:
/// 1. Connects to the database (10 s acquire deadline)
/// 2. Runs migrations to create tables
/// 3. Returns a ready-to-use `Repo`
///
/// An unreachable database is fatal to the caller.
#[cfg(feature = "postgres")]
pub async fn build_repo(database_url: &str) -> anyhow::Result<Repo> {
    PostgresRepo::new(database_url).await
}

/// Memory-only builds ignore the URL.
#[cfg(all(feature = "memory", not(feature = "postgres")))]
pub async fn build_repo(database_url: &str) -> anyhow::Result<Repo> {
    tracing::warn!("Using in-memory store; {} is ignored", database_url);
    Ok(MemoryRepo::new())
}
