pub mod context;
pub mod engines;
pub mod test_entity;
pub mod wait_utils;
