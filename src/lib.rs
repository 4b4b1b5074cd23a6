//! # mutation-harness
//!
//! `mutation-harness` pairs a toy arithmetic library with a small mutation testing toolkit:
//! - `calculator`: the arithmetic functions the demo campaign targets
//! - `mutation`: line-granular text mutation, test running, test synthesis, and the
//!   agent/loop drivers (feature `mutation`)
//!
//! The mutation engine is language-agnostic text rewriting. It never parses the subject; it
//! applies one regex rule to one line at a time and lets an external test command decide
//! whether the change was noticed.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

pub mod calculator;

#[cfg(feature = "mutation")]
#[cfg_attr(docsrs, doc(cfg(feature = "mutation")))]
pub mod mutation;
