//! Re-export of the public api of this crate.
pub use crate::{
    activation::Activation,
    error::{Error, Result},
    hash::{HashSpec, VecHash, DWTA, WTA},
    init::Initializer,
    loss::SoftmaxCrossEntropy,
    network::{Network, NetworkConfig},
    optimizer::Optimizer,
    scheduler::Scheduler,
};
