//! End-to-end tests driving `vpack` against a shell-script bundler.

#![cfg(unix)]

mod build_tests;
mod common;
mod local_tests;
mod manual_tests;
