// Entry layer - adapts command-line and HTTP-style triggers to workflows.

#[path = "invocation.rs"]
pub mod invocation;
