//! # Ports Layer
//!
//! - `inbound`: callback sinks handed to the business layer
//! - `outbound`: business-layer tables consumed by the method handlers

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
