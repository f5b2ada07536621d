mod constants;
mod constants_config;
mod run_config;

pub use constants::*;
pub use constants_config::*;
pub use run_config::*;
