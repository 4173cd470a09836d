//! Shared utilities and common types for the event rental backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Identity token verification (JWT) and roles
//! - Common validation logic

pub mod jwt;
pub mod validation;
