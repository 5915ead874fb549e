//! vpack-lib: multi-platform content build and packaging
//!
//! The pipeline takes a [`content::ContentDescriptor`] through these stages:
//! - `validate`: structural rules and auto-corrections on the source assets
//! - `env`: switch the external build environment per platform and restore it
//! - `bundle`: drive the external bundler and check its catalog output
//! - `staging`: relocate raw bundler output into canonical platform folders
//! - `manifest`: write manifest and metadata files with their hash siblings
//! - `archive`: zip the staging root into a `.vmap`/`.vobj`/`.vavt` package
//!
//! [`build::Pipeline`] orchestrates them and reports a [`build::BuildResult`].

pub mod archive;
pub mod build;
pub mod bundle;
pub mod config;
pub mod consts;
pub mod content;
pub mod env;
pub mod identity;
pub mod manifest;
pub mod platform;
pub mod scene;
pub mod staging;
pub mod util;
pub mod validate;
