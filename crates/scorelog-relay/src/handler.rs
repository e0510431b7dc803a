use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use scorelog_frame::ScoreEvent;
use tracing::error;

use crate::config::RelayConfig;

/// Failure reported by a single handler invocation.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The handler reported a failure with a diagnostic message.
    #[error("{0}")]
    Failed(String),

    /// I/O error inside the handler.
    #[error("handler I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error inside the handler.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An external command ran but did not succeed.
    #[error("command exited with {0}")]
    ExitStatus(std::process::ExitStatus),

    /// An external command ran past its time limit and was killed.
    #[error("command timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Build a failure from a diagnostic message.
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// A consumer of decoded score events.
///
/// Receives, per event: the aggregate score, the required score, the symbol
/// results in wire order, the worker-wide configuration and the settings id.
pub trait ScoreHandler {
    /// Name used when logging failures.
    fn name(&self) -> &str;

    /// Consume one event. Errors are logged by the registry and never
    /// propagate further.
    fn invoke(&self, event: &ScoreEvent, config: &RelayConfig) -> Result<(), HandlerError>;
}

/// Adapts a closure into a [`ScoreHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&ScoreEvent, &RelayConfig) -> Result<(), HandlerError>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> ScoreHandler for FnHandler<F>
where
    F: Fn(&ScoreEvent, &RelayConfig) -> Result<(), HandlerError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, event: &ScoreEvent, config: &RelayConfig) -> Result<(), HandlerError> {
        (self.f)(event, config)
    }
}

/// Outcome of delivering one event to the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub invoked: usize,
    pub failed: usize,
}

/// Ordered set of handlers, filled before the relay starts.
///
/// The relay only needs `&self` to dispatch, so handlers cannot be added or
/// removed while events are being delivered.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn ScoreHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; handlers run in registration order.
    pub fn register(&mut self, handler: impl ScoreHandler + 'static) -> &mut Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Append a closure handler.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&ScoreEvent, &RelayConfig) -> Result<(), HandlerError> + 'static,
    {
        self.register(FnHandler::new(name, f))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in dispatch order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.name())
    }

    /// Deliver `event` to every handler in order.
    ///
    /// A handler that returns an error or panics is logged and skipped; the
    /// remaining handlers still run. Nothing is retried.
    pub fn dispatch(&self, event: &ScoreEvent, config: &RelayConfig) -> DispatchReport {
        let mut report = DispatchReport::default();

        for handler in &self.handlers {
            report.invoked += 1;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.invoke(event, config)))
                .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(&*payload))));

            if let Err(err) = outcome {
                report.failed += 1;
                error!(
                    handler = handler.name(),
                    error = %err,
                    "error executing score handler"
                );
            }
        }

        report
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn sample() -> ScoreEvent {
        ScoreEvent::new(3.0, 10.0, 4)
            .with_symbol(1, 1.0)
            .with_symbol(2, 2.0)
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        for name in ["first", "second", "third"] {
            let calls = Rc::clone(&calls);
            registry.register_fn(name, move |_, _| {
                calls.borrow_mut().push(name);
                Ok(())
            });
        }

        let report = registry.dispatch(&sample(), &RelayConfig::default());
        assert_eq!(report, DispatchReport { invoked: 3, failed: 0 });
        assert_eq!(*calls.borrow(), vec!["first", "second", "third"]);
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn failing_handler_does_not_stop_later_handlers() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register_fn("fails", |_, _| Err(HandlerError::msg("lookup failed")));
        {
            let seen = Rc::clone(&seen);
            registry.register_fn("records", move |event, _| {
                seen.borrow_mut().push(event.clone());
                Ok(())
            });
        }

        let report = registry.dispatch(&sample(), &RelayConfig::default());
        assert_eq!(report, DispatchReport { invoked: 2, failed: 1 });
        assert_eq!(*seen.borrow(), vec![sample()]);
    }

    #[test]
    fn panicking_handler_is_isolated() {
        let reached = Rc::new(RefCell::new(0usize));
        let mut registry = HandlerRegistry::new();
        registry.register_fn("panics", |_, _| panic!("boom"));
        {
            let reached = Rc::clone(&reached);
            registry.register_fn("after", move |_, _| {
                *reached.borrow_mut() += 1;
                Ok(())
            });
        }

        let report = registry.dispatch(&sample(), &RelayConfig::default());
        assert_eq!(report.failed, 1);
        assert_eq!(*reached.borrow(), 1);
    }

    #[test]
    fn handlers_receive_worker_config() {
        let mut registry = HandlerRegistry::new();
        registry.register_fn("config", |_, config| {
            if config.worker_name == "custom" {
                Ok(())
            } else {
                Err(HandlerError::msg("unexpected config"))
            }
        });

        let config = RelayConfig {
            worker_name: "custom".to_string(),
            ..RelayConfig::default()
        };
        assert_eq!(registry.dispatch(&sample(), &config).failed, 0);
    }

    #[test]
    fn empty_registry_dispatch_is_a_no_op() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        let report = registry.dispatch(&sample(), &RelayConfig::default());
        assert_eq!(report, DispatchReport::default());
    }

    #[test]
    fn panic_payloads_are_rendered() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }
}
