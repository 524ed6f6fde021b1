//! Privileged RISC-V instruction wrappers.
//!
//! Every function compiles on any target so that code built on top of it can
//! be unit tested on the host, but only does something on RISC-V.

#![no_std]

pub mod asm;
