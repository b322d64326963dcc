//! AdLens identity resolution.
//!
//! Collapses the fragmented tracking identities behind one purchase into
//! a single set of visitor ids, so that journey building sees every
//! device and browser the customer actually used.

pub mod resolver;

pub use resolver::IdentityResolver;
