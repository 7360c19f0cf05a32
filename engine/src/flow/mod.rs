//! The booking flow state machine.
//!
//! One reducer drives the whole surface: availability loading, the hold
//! lifecycle and countdown, promo and gift-card pricing, checkout, redirect
//! resume, persistence coalescing, and idle tracking. Rendering layers
//! attach as thin adapters over the store and never own booking rules.

mod actions;
mod environment;
mod reducer;
mod state;

pub use actions::FlowAction;
pub use environment::FlowEnvironment;
pub use reducer::BookingFlowReducer;
pub use state::{CheckoutStage, FlowState, FlowStep, RequestTag};
