//! airscan-scan: wireless scan engine.
//!
//! Reads the snapshots airodump-ng keeps rewriting, resolves WPS state,
//! filters and ranks targets, reports named networks to the ingestion
//! service and decloaks hidden ones with aireplay-ng deauth bursts.

pub mod capture;
pub mod config;
pub mod decloak;
pub mod engine;
pub mod error;
pub mod filter;
pub mod inject;
pub mod sink;
pub mod snapshot;
pub mod wps;
