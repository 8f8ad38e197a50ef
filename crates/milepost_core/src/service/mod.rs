//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store and history calls into use-case level APIs.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod milestone_service;
