pub mod detection;
pub mod lifecycle;
pub mod pipeline;
pub mod shared;
pub mod video;
