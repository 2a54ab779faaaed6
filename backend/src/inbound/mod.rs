//! Inbound adapters that translate external requests into domain service
//! calls while keeping framework details at the edge.
//!
//! The `portal` command line lives under [`cli`].

pub mod cli;
