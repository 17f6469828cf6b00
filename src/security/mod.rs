//! Security Module
//!
//! Secure memory utilities for seed and key material.

pub mod secure_memory;

pub use secure_memory::*;
