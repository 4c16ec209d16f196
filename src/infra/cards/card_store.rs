// Implementations of the core `CardStore` port.

#[cfg(test)]
pub mod in_memory;
pub mod mongo_store;

// Re-export for convenience
#[cfg(test)]
pub use in_memory::InMemoryCardStore;
pub use mongo_store::MongoCardStore;
