#[macro_use]
extern crate log;

mod config;
mod error;
mod packet;

pub use config::*;
pub use error::*;
pub use packet::*;
