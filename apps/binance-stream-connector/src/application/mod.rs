//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for external systems (transport, consumer callback).
pub mod ports;

/// Application services (admission and send rate limiting).
pub mod services;
