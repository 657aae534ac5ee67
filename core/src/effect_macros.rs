//! Declarative macros for ergonomic effect construction
//!
//! Network effects in feature reducers are almost always "run this async
//! block and feed the resulting action back". These macros keep that terse.

/// Create an `Effect::Future` from an async block
///
/// The block evaluates to `Option<Action>`; `None` means no follow-up.
///
/// # Example
///
/// ```rust,ignore
/// use popseoul_core::async_effect;
///
/// let client = Arc::clone(&env.clients.challenges);
/// async_effect! {
///     match client.get(id).await {
///         Ok(challenge) => Some(DetailAction::Fetched(challenge)),
///         Err(_) => Some(DetailAction::NetworkError),
///     }
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use popseoul_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(2),
///     action: DetailAttractionAction::HideToast
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::effect::Effect;
    use std::time::Duration;

    #[derive(Clone, Debug)]
    enum TestAction {
        Fetched { id: i64 },
        HideToast,
    }

    #[test]
    fn test_async_effect_macro() {
        let effect = async_effect! {
            Some(TestAction::Fetched { id: 42 })
        };

        assert!(matches!(effect, Effect::Future(_)));
    }

    #[test]
    fn test_delay_macro() {
        let effect = delay! {
            duration: Duration::from_secs(2),
            action: TestAction::HideToast
        };

        assert!(matches!(effect, Effect::Delay { .. }));
    }
}
