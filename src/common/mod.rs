//! Common traits and helpers shared by the server, the CLI and the tests

pub mod test_utils;
pub mod traits;

pub use test_utils::{TestServer, spawn_test_server};
pub use traits::EchoServerTrait;
