#![cfg_attr(doc, doc = include_str!("../README.md"))]

mod macros;

mod cursor;
mod wire;

pub use self::cursor::*;
pub use self::wire::*;
