//! Base types and error handling.
//!
//! Provides the crate-wide error type, [`NetError`](neterror::NetError), with
//! stable integer codes in the style of Chromium's `net_error_list.h`.

pub mod neterror;

#[cfg(test)]
mod tests;
