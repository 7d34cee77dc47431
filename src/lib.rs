//! mcsw - a Minecraft server wrapper.
//!
//! Supervises a Minecraft server process: keeps it installed and up to
//! date, reads and classifies its console output, forwards operator
//! commands, restarts it per policy, and fans decoded events out to
//! pluggable listeners.

pub mod config;
pub mod display;
pub mod history;
pub mod listeners;
pub mod server;
pub mod supervisor;
pub mod updater;
