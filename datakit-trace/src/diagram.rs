use tracing::debug;

/// Minimum number of consecutive identical calls before they collapse into a
/// `loop N times` block. Below the threshold the calls are unrolled.
const LOOP_THRESHOLD: usize = 3;

/// Call signatures longer than this are truncated with an ellipsis.
const MAX_SIGNATURE_LEN: usize = 100;

/// How a traced call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call returned normally, with a rendered return value.
    Returned(String),
    /// The call failed, with the error type's name.
    Failed(String),
}

/// One traced function entry, consumed by [`SequenceDiagram::record`].
#[derive(Debug, Clone)]
pub struct CallEvent {
    pub caller: String,
    pub callee: String,
    /// Rendered argument list, without the surrounding parentheses.
    pub args: String,
    pub outcome: CallOutcome,
}

struct PendingCall {
    caller: String,
    callee: String,
    lines: Vec<String>,
    count: usize,
}

/// Append-only builder for a PlantUML sequence diagram.
///
/// Events arrive in call order. Consecutive calls with the same caller/callee
/// pair are held back and collapsed into a loop block once they repeat often
/// enough; [`SequenceDiagram::finish`] flushes the held call and renders the
/// full `@startuml .. @enduml` text. A diagram is consumed exactly once.
#[derive(Default)]
pub struct SequenceDiagram {
    participants: Vec<String>,
    lines: Vec<String>,
    pending: Option<PendingCall>,
}

impl SequenceDiagram {
    pub fn new() -> SequenceDiagram {
        SequenceDiagram::default()
    }

    /// Appends one call to the diagram.
    pub fn record(&mut self, event: CallEvent) {
        self.add_participant(&event.caller);
        self.add_participant(&event.callee);

        if let Some(pending) = &mut self.pending
            && pending.caller == event.caller
            && pending.callee == event.callee
        {
            // A repeat of the held call: count it, keep the first call's
            // rendered lines as the loop body.
            pending.count += 1;
            return;
        }

        self.flush_pending();

        let signature = format!("{}({})", event.callee, truncate(&event.args));

        let mut lines = vec![
            format!(r#""{}" -> "{}": {}"#, event.caller, event.callee, signature),
            format!(r#"activate "{}""#, event.callee),
        ];

        match &event.outcome {
            CallOutcome::Returned(value) => lines.push(format!(
                r#""{}" --> "{}": return {}"#,
                event.callee,
                event.caller,
                truncate(value)
            )),
            CallOutcome::Failed(error_type) => lines.push(format!(
                r#""{}" -x "{}": raise {error_type}"#,
                event.callee, event.caller
            )),
        }

        lines.push(format!(r#"deactivate "{}""#, event.callee));

        self.pending = Some(PendingCall {
            caller: event.caller,
            callee: event.callee,
            lines,
            count: 1,
        });
    }

    /// Flushes the held call and renders the complete diagram text.
    pub fn finish(mut self) -> String {
        self.flush_pending();

        let mut out = vec!["@startuml".to_owned()];
        out.extend(
            self.participants
                .iter()
                .map(|p| format!(r#"participant "{p}""#)),
        );
        out.extend(self.lines);
        out.push("@enduml".to_owned());

        out.join("\n") + "\n"
    }

    fn add_participant(&mut self, name: &str) {
        if !self.participants.iter().any(|p| p == name) {
            self.participants.push(name.to_owned());
        }
    }

    fn flush_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        if pending.count >= LOOP_THRESHOLD {
            debug!(
                callee = %pending.callee,
                count = pending.count,
                "collapsing repeated calls into a loop block"
            );
            self.lines.push(format!("loop {} times", pending.count));
            self.lines.extend(pending.lines);
            self.lines.push("end".to_owned());
        } else {
            for _ in 0..pending.count {
                self.lines.extend(pending.lines.iter().cloned());
            }
        }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_SIGNATURE_LEN {
        let head: String = text.chars().take(MAX_SIGNATURE_LEN).collect();
        format!("{head}...")
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn returned(caller: &str, callee: &str, args: &str, value: &str) -> CallEvent {
        CallEvent {
            caller: caller.to_owned(),
            callee: callee.to_owned(),
            args: args.to_owned(),
            outcome: CallOutcome::Returned(value.to_owned()),
        }
    }

    #[test]
    fn single_call_renders_arrow_activation_and_return() {
        let mut diagram = SequenceDiagram::new();
        diagram.record(returned("main", "load", "\"cfg\"", "5"));

        let text = diagram.finish();

        assert!(text.starts_with("@startuml\n"));
        assert!(text.ends_with("@enduml\n"));
        assert!(text.contains(r#"participant "main""#));
        assert!(text.contains(r#"participant "load""#));
        assert!(text.contains(r#""main" -> "load": load("cfg")"#));
        assert!(text.contains(r#"activate "load""#));
        assert!(text.contains(r#""load" --> "main": return 5"#));
        assert!(text.contains(r#"deactivate "load""#));
    }

    #[test]
    fn failed_call_renders_a_raise_arrow() {
        let mut diagram = SequenceDiagram::new();
        diagram.record(CallEvent {
            caller: "main".to_owned(),
            callee: "load".to_owned(),
            args: String::new(),
            outcome: CallOutcome::Failed("SettingsError".to_owned()),
        });

        let text = diagram.finish();

        assert!(text.contains(r#""load" -x "main": raise SettingsError"#));
        assert!(!text.contains("return"));
    }

    #[test]
    fn three_repeats_collapse_into_a_loop() {
        let mut diagram = SequenceDiagram::new();
        for _ in 0..3 {
            diagram.record(returned("main", "step", "1", "()"));
        }

        let text = diagram.finish();

        assert!(text.contains("loop 3 times"));
        assert!(text.contains("\nend\n"));
        assert_eq!(text.matches(r#""main" -> "step""#).count(), 1);
    }

    #[test]
    fn two_repeats_are_unrolled() {
        let mut diagram = SequenceDiagram::new();
        for _ in 0..2 {
            diagram.record(returned("main", "step", "1", "()"));
        }

        let text = diagram.finish();

        assert!(!text.contains("loop"));
        assert_eq!(text.matches(r#""main" -> "step""#).count(), 2);
    }

    #[test]
    fn a_different_call_flushes_the_pending_run() {
        let mut diagram = SequenceDiagram::new();
        for _ in 0..4 {
            diagram.record(returned("main", "step", "1", "()"));
        }
        diagram.record(returned("main", "finish", "", "()"));

        let text = diagram.finish();

        assert!(text.contains("loop 4 times"));
        let loop_pos = text.find("loop 4 times").unwrap();
        let finish_pos = text.find(r#""main" -> "finish""#).unwrap();
        assert!(loop_pos < finish_pos);
    }

    #[test]
    fn long_signatures_are_truncated() {
        let args = "x".repeat(150);
        let mut diagram = SequenceDiagram::new();
        diagram.record(returned("main", "step", &args, "()"));

        let text = diagram.finish();
        let expected = format!("step({}...)", "x".repeat(100));

        assert!(text.contains(&expected));
    }

    #[test]
    fn participants_are_declared_once() {
        let mut diagram = SequenceDiagram::new();
        diagram.record(returned("main", "a", "", "()"));
        diagram.record(returned("a", "main", "", "()"));

        let text = diagram.finish();

        assert_eq!(text.matches(r#"participant "main""#).count(), 1);
        assert_eq!(text.matches(r#"participant "a""#).count(), 1);
    }
}
