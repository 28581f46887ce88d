//! Precedence resolution
//!
//! A [`PrecedenceChain`] holds the sources in priority order; the
//! [`PrecedenceResolver`] queries all of them for every declared field and
//! merges the answers into one [`MergedMapping`].

mod chain;
mod merge;

pub use chain::{Candidate, PrecedenceChain};
pub use merge::{MergedMapping, PrecedenceResolver, Provenance};
