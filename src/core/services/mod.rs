// src/core/services/mod.rs

// Narrow clients for the external collaborators the core consumes. Each one
// wraps exactly the surface the checks need and nothing more.

/// IP geolocation via ip-api.com.
pub mod geo;

/// WHOIS registration/expiration dates.
pub mod whois;

/// LLM content classifier with API-key rotation.
pub mod classifier;

/// User review store contract plus an in-memory implementation.
pub mod reviews;

/// Screenshot capture contract (pure side channel).
pub mod screenshot;
