//! Capsync - Multi-File Caption Editing for Image Datasets
//!
//! A Rust implementation of joint caption editing across many images: load the
//! captions of N files, edit them as one merged tag view, and propagate the
//! per-tag changes (add, delete, rename, split, merge, move) back to every file.

pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod session;
pub mod store;
pub mod workflow;
