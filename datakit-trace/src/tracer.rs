use std::fmt::Debug;
use std::sync::Mutex;

use crate::diagram::{CallEvent, CallOutcome, SequenceDiagram};

/// Thread-safe collector of traced calls for one process run.
///
/// Tracing is explicit scoped wrapping: the call site names itself, the
/// function being called and the rendered arguments, and the closure's result
/// propagates unchanged.
#[derive(Default)]
pub struct Tracer {
    diagram: Mutex<SequenceDiagram>,
}

impl Tracer {
    pub fn new() -> Tracer {
        Tracer::default()
    }

    /// Runs `f` and records the call and its outcome.
    ///
    /// The return value is rendered through `Debug`; an error is rendered as
    /// its type name only, so error payloads never leak into the diagram.
    pub fn traced<T, E>(
        &self,
        caller: &str,
        callee: &str,
        args: &str,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        T: Debug,
    {
        let result = f();

        let outcome = match &result {
            Ok(value) => CallOutcome::Returned(format!("{value:?}")),
            Err(_) => CallOutcome::Failed(short_type_name::<E>().to_owned()),
        };

        self.diagram
            .lock()
            .expect("tracer lock poisoned")
            .record(CallEvent {
                caller: caller.to_owned(),
                callee: callee.to_owned(),
                args: args.to_owned(),
                outcome,
            });

        result
    }

    /// Consumes the tracer and renders the collected diagram.
    pub fn finish(self) -> String {
        self.diagram
            .into_inner()
            .expect("tracer lock poisoned")
            .finish()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct StepError(&'static str);

    impl std::fmt::Display for StepError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    #[test]
    fn success_propagates_and_is_recorded() {
        let tracer = Tracer::new();

        let result: Result<i32, StepError> =
            tracer.traced("main", "double", "21", || Ok(42));

        assert_eq!(result.unwrap(), 42);

        let text = tracer.finish();
        assert!(text.contains(r#""main" -> "double": double(21)"#));
        assert!(text.contains("return 42"));
    }

    #[test]
    fn failure_propagates_unchanged_and_records_the_type_name() {
        let tracer = Tracer::new();

        let result: Result<(), StepError> =
            tracer.traced("main", "explode", "", || Err(StepError("boom")));

        assert_eq!(result.unwrap_err(), StepError("boom"));

        let text = tracer.finish();
        assert!(text.contains("raise StepError"));
        assert!(!text.contains("boom"));
    }

    #[test]
    fn repeated_traced_calls_collapse() {
        let tracer = Tracer::new();

        for i in 0..3 {
            let _: Result<i32, StepError> =
                tracer.traced("main", "step", "i", || Ok(i));
        }

        let text = tracer.finish();
        assert!(text.contains("loop 3 times"));
    }
}
