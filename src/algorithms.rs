// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe
use std::fmt;

pub mod multilevel;
pub mod recursive_bipartitioning;

pub use multilevel::{Bisector, GreedyBisector};
pub use recursive_bipartitioning::RecursiveBipartitioner;

/// Common errors thrown by algorithms.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input sets don't have matching lengths.
    InputLenMismatch { expected: usize, actual: usize },

    /// When a bisection algorithm is asked for more than 2 parts.
    BiPartitioningOnly,

    /// A partition into fewer than 2 blocks was requested.
    InvalidNumberOfBlocks { k: usize },

    /// A configuration string does not name a known variant.
    UnknownOption { option: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InputLenMismatch { expected, actual } => write!(
                f,
                "input sets don't have the same length (expected {expected} items, got {actual})",
            ),
            Error::BiPartitioningOnly => write!(f, "expected no more than two parts"),
            Error::InvalidNumberOfBlocks { k } => {
                write!(f, "cannot partition into {k} blocks")
            }
            Error::UnknownOption { option } => write!(f, "illegal option: {option}"),
        }
    }
}

impl std::error::Error for Error {}
