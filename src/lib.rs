pub mod errors;
pub mod utils;
pub mod particles;
pub mod visualization;
#[cfg(feature = "distributed")]
pub mod distributed;
pub mod driver;
