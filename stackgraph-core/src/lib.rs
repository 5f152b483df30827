//! Stackgraph Core
//!
//! Core library for building infrastructure as a graph of typed resource
//! declarations and synthesising it into a template for a provisioning engine

pub mod effect;
pub mod graph;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod stack;
pub mod synth;
pub mod template;
