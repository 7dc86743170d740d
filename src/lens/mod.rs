//! Lens module
//!
//! High-level business logic, reusable across interfaces (CLI, REST,
//! embedding as a library). Each lens module exports:
//!
//! - A **Lens struct** (`StateLens`) - the entry point for all operations
//! - **Query/args structs** - input for lens methods
//! - **Output types** - result records
//!
//! Internal details (payload parsing, upstream calls) stay private to the
//! lens module; external users interact through the lens.

pub mod state;
