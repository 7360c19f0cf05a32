//! The core trait for booking business logic.
//!
//! Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
//! They contain all business rules and are deterministic and testable; the
//! runtime's `Store` owns state and executes the returned effects.

use crate::effect::Effect;
use smallvec::SmallVec;

/// The number of effects a single transition usually produces. Most
/// transitions return zero or one effect; four covers the hold-creation path
/// (request + tick + snapshot + telemetry) without heap allocation.
pub const INLINE_EFFECTS: usize = 4;

/// Effect vector returned from [`Reducer::reduce`].
pub type Effects<A> = SmallVec<[Effect<A>; INLINE_EFFECTS]>;

/// The Reducer trait - core abstraction for the booking state machine.
///
/// # Example
///
/// ```ignore
/// impl Reducer for BookingFlowReducer {
///     type State = FlowState;
///     type Action = FlowAction;
///     type Environment = FlowEnvironment;
///
///     fn reduce(
///         &self,
///         state: &mut FlowState,
///         action: FlowAction,
///         env: &FlowEnvironment,
///     ) -> Effects<FlowAction> {
///         match action {
///             FlowAction::SelectSlot { .. } => {
///                 // transition + effect descriptions here
///                 smallvec![]
///             }
///             _ => smallvec![],
///         }
///     }
/// }
/// ```
pub trait Reducer {
    /// The state type this reducer operates on.
    type State;

    /// The action type this reducer processes.
    type Action;

    /// The environment type with injected dependencies.
    type Environment;

    /// Reduce an action into state changes and effects.
    ///
    /// This is a pure function that validates the action, updates state in
    /// place, and returns effect descriptions to be executed by the runtime.
    /// Reducers must not perform I/O or panic.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects<Self::Action>;
}
