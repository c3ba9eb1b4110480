//! AXI DMA bridge driver for StarryOS.
//!
//! The driver lives under [`vfs::dev::axidma`]; [`vfs::dev::registry`] keeps
//! the character device numbers it binds.

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;
extern crate alloc;

pub mod vfs;
