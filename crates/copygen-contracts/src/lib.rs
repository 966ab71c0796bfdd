pub mod brief;
pub mod events;
pub mod items;
pub mod store;
