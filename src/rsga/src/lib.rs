mod archive;
mod essence;

pub mod cli;
pub mod extract;
pub mod manifest;
pub mod opener;
pub mod verify;

pub use archive::*;
pub use essence::*;
