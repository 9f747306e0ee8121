//! Section resolvers: read-only lookup structures built once from their section.
//!
//! Every resolver is loaded before the first record is decoded and is never
//! mutated afterwards, except the in-memory [`offset_map::OffsetMap`] which
//! the primary pass fills.

pub mod common;
pub mod copy_table;
pub mod index_table;
pub mod offset_map;
pub mod pallet;
pub mod strings;
