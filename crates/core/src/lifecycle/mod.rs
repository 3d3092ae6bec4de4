pub mod resource_guard;
pub mod scratch;
