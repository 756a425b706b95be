#[macro_use]
extern crate log;

pub mod api;
pub mod loopback;
mod util;

pub use api::status::{Result, Status};
pub use loopback::{LoopbackFs, new_loopback_fs};
