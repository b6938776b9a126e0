pub mod actor;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod licence;
pub mod listing;
pub mod service;
pub mod utils;
