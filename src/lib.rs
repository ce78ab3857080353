//! isx2gb, a converter from ISAS's ISX object format to flat Game Boy ROMs.

#![deny(missing_docs)]
#![deny(unused)]
#![deny(warnings)]
#![deny(unsafe_code)]

pub mod addr;
pub mod config;
pub mod convert;
pub mod emit;
pub mod error;
pub mod isx;
pub mod layout;
pub mod link;
pub mod rom;
