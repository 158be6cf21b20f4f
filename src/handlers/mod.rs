pub mod config;
pub mod interviews;

pub use self::config::*;
pub use self::interviews::*;
