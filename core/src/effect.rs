//! Side effect descriptions.
//!
//! Effects are NOT executed immediately. They are descriptions of what should
//! happen, returned from reducers and executed by the Store runtime. Actions
//! produced by effects feed back into the reducer, which is how network
//! responses, countdown ticks, and snapshot flushes re-enter the state
//! machine.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returning an optional feedback action.
pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

/// Effect type - describes a side effect to be executed.
///
/// # Type Parameters
///
/// - `Action`: the action type that effects can produce (feedback loop)
pub enum Effect<Action> {
    /// No-op effect.
    None,

    /// Run effects in parallel.
    Parallel(Vec<Effect<Action>>),

    /// Run effects sequentially.
    Sequential(Vec<Effect<Action>>),

    /// Delayed action. Used for the 1-second countdown/idle ticks, the
    /// coalesced snapshot flush, and confirmation-poll intervals. A delayed
    /// action is advisory: the reducer re-checks state when it arrives, so a
    /// tick for a hold that no longer exists is simply ignored.
    Delay {
        /// How long to wait.
        duration: Duration,
        /// Action to dispatch after the delay.
        action: Box<Action>,
    },

    /// Arbitrary async computation (network calls, storage writes).
    ///
    /// Returns `Option<Action>` - if `Some`, the action is fed back into the
    /// reducer.
    Future(EffectFuture<Action>),
}

// Manual Debug implementation since Future doesn't implement Debug.
impl<Action> std::fmt::Debug for Effect<Action>
where
    Action: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::None => write!(f, "Effect::None"),
            Effect::Parallel(effects) => f.debug_tuple("Effect::Parallel").field(effects).finish(),
            Effect::Sequential(effects) => {
                f.debug_tuple("Effect::Sequential").field(effects).finish()
            },
            Effect::Delay { duration, action } => f
                .debug_struct("Effect::Delay")
                .field("duration", duration)
                .field("action", action)
                .finish(),
            Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
        }
    }
}

impl<Action> Effect<Action> {
    /// Combine effects to run in parallel.
    #[must_use]
    pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
        Effect::Parallel(effects)
    }

    /// Chain effects to run sequentially.
    #[must_use]
    pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
        Effect::Sequential(effects)
    }

    /// Wrap an async computation as an effect.
    pub fn future<F>(fut: F) -> Effect<Action>
    where
        F: Future<Output = Option<Action>> + Send + 'static,
    {
        Effect::Future(Box::pin(fut))
    }

    /// Dispatch an action after a delay.
    #[must_use]
    pub fn delay(duration: Duration, action: Action) -> Effect<Action> {
        Effect::Delay {
            duration,
            action: Box::new(action),
        }
    }
}
