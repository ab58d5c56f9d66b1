//! Document Store Backend Library
//!
//! Core components for the arqiv backend: configuration, the identity-provider
//! gateway (token verification, permission resolution, access policy), and the
//! HTTP API assembly.

pub mod api;
pub mod auth;
pub mod config;
