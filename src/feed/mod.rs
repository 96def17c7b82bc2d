pub mod navigator;
pub mod page;
pub mod registry;
pub mod storage;
pub mod viewport;
pub mod visibility;
