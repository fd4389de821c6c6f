#![allow(dead_code)]
//! Sub-linear deep learning: hash-sparse feed-forward networks.
//!
//! A [`Network`](network::Network) is a stack of [`Layer`](layer::Layer)s,
//! each retrieving its active neurons via locality-sensitive hashing
//! instead of a dense matrix multiply. See [`prelude`] for the common
//! entry points.
extern crate ndarray;

pub mod activation;
pub mod batch;
pub mod error;
pub mod hash;
pub mod init;
pub mod layer;
pub mod loss;
pub mod network;
pub mod neuron;
pub mod optimizer;
pub mod scheduler;
pub mod table;
pub mod utils;
pub mod prelude;

pub use error::{Error, Result};
pub use network::{Network, NetworkConfig};
