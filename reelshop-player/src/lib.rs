//! Headless driver for the Reelshop feed.

pub mod cli;
pub mod commands;
