//! Public API: table handles, builder-pattern queries and value comparison.

pub mod builders;
pub mod filter;
pub mod query;
pub mod table;

pub use builders::{FindBuilder, TableBuilder};
pub use filter::loose_eq;
pub use query::{Direction, Lookup, OrderBy, Query};
pub use table::Table;
