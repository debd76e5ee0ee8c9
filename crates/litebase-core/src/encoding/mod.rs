//! Value coercion and the identity-keyed row codec.

pub mod coerce;
pub mod row;

pub use row::{EncodedRow, decode_row, encode_row, encode_value};
