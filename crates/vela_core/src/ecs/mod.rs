//! # Entity Component System
//!
//! The VELA world store: entities, the closed component union, and the
//! bitmask-cached query engine.

pub mod component;
pub mod entity;
pub mod world;
