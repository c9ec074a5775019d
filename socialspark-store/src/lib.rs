pub mod multimap;
pub mod store;
