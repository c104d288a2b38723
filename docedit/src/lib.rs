//! docedit - block-oriented DOCX edit reconciliation
//!
//! The crate reads a .docx container into a [`snapshot::Snapshot`], extracts
//! its addressable blocks ([`extract`]), checks edit plans against them
//! ([`validate`]), applies validated plans to the document markup
//! ([`apply`]) and keeps tables of contents in line with the headings
//! ([`toc_sync`]). [`pipeline::Pipeline`] drives the whole sequence.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::pedantic))]
#![cfg_attr(all(not(debug_assertions), not(test)), warn(missing_docs))]
// Allow some pedantic lints that are too strict for this project
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alias;
pub mod apply;
pub mod config;
pub mod extract;
pub mod markup;
pub mod model;
pub mod numbering;
pub mod package;
pub mod pipeline;
pub mod plan;
pub mod runs;
pub mod snapshot;
pub mod styles;
pub mod toc_sync;
pub mod validate;
pub mod verify;

#[cfg(test)]
mod fixtures;
