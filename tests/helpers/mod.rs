#![allow(dead_code, unused_imports)]
pub mod fixtures;
pub mod mock_channel;
pub mod test_app;
pub mod test_db;

pub use fixtures::*;
pub use mock_channel::*;
pub use test_app::*;
pub use test_db::*;
