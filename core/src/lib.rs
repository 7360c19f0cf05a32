//! # Bookflow Core
//!
//! Core traits and types for the bookflow booking-hold engine.
//!
//! The engine is built as a single pure state machine: all booking business
//! rules live in a [`reducer::Reducer`] over owned state, and every side
//! effect (network call, countdown tick, snapshot flush) is returned as an
//! [`effect::Effect`] description that the runtime executes. Rendering
//! surfaces attach as thin adapters and never own booking rules.
//!
//! ## Core Concepts
//!
//! - **State**: owned domain state for the booking flow
//! - **Action**: all possible inputs to a reducer (commands and responses)
//! - **Reducer**: pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: side effect descriptions (not execution)
//! - **Environment**: injected dependencies via traits ([`environment::Clock`],
//!   [`event_sink::EventSink`], and the engine's API/storage seams)
//!
//! ## Architecture Principles
//!
//! - Functional core, imperative shell
//! - Unidirectional data flow with an action feedback loop
//! - Explicit effects (no hidden I/O in reducers)
//! - Injectable clock so tests simulate time without real delays

pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

pub mod effect;
pub mod environment;
pub mod event_sink;
pub mod reducer;
