#![allow(unused_crate_dependencies)] // false positives because there is both a library and a test binary

//! Integration Tests (IT)
//!
//! Integration tests are all contained in this single crate, and organized in modules.
//! This is to prevent `rustc` to re-link the library crates with each of the integration
//! tests (one for each *.rs file / test crate under the `tests/` folder).

mod ber;
mod cotp;
mod mms;
mod report;
mod subscription;
mod tpkt;
