pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod policy;
pub mod progress;
pub mod provider;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod transfer;
pub mod vpath;

pub use config::Config;
pub use error::{Error, Result};
pub use model::*;
pub use progress::*;
pub use scanner::ScanOptions;
pub use session::Session;
