//! Structured diagnostics collected while inferring, reading and merging
//! declarations.
//!
//! Every event is recorded in a [`Diagnostics`] sink owned by the caller and
//! mirrored to the `log` crate, so library code carries no mutable global
//! state.

use serde::Serialize;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, e.g. a parameter that disappeared from source.
    Info,
    /// Something a human should look at, e.g. a merge conflict.
    Warning,
    /// An unsupported construct that was skipped.
    Error,
}

/// A single diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A source construct the inference does not handle, e.g. a nested
    /// class definition. The enclosing declaration is still produced.
    UnsupportedConstruct {
        /// What was skipped ("nested class", "nested function", ...).
        construct: String,
        /// Name of the skipped definition.
        name: String,
        /// 1-based source line.
        line: usize,
    },
    /// Two irreconcilable types met during a merge; the declaration now
    /// carries a `__conflict__type__` sentinel.
    TypeConflict {
        /// Name of the variable or function.
        name: String,
        /// The conflict sentinel that was produced.
        resolved: String,
    },
    /// Two irreconcilable values met during a merge; the declaration now
    /// carries a `__conflict__val__` sentinel.
    ValueConflict {
        /// Name of the variable.
        name: String,
        /// The conflict sentinel that was produced.
        resolved: String,
    },
    /// A freshly inferred argument has no counterpart in the persisted
    /// declaration.
    ArgumentAdded {
        /// Owning function.
        function: String,
        /// Argument name.
        argument: String,
    },
    /// A persisted argument has no counterpart in the fresh parse. It is
    /// dropped, not re-added.
    ArgumentRemoved {
        /// Owning function.
        function: String,
        /// Argument name.
        argument: String,
    },
    /// A declaration-file fragment that could not be parsed cleanly and was
    /// reconstructed best-effort.
    MalformedLine {
        /// The offending logical line or fragment.
        text: String,
    },
}

impl Event {
    /// Severity this event is reported at.
    pub fn severity(&self) -> Severity {
        match self {
            Event::UnsupportedConstruct { .. } => Severity::Error,
            Event::TypeConflict { .. } | Event::ValueConflict { .. } => Severity::Warning,
            Event::ArgumentAdded { .. } | Event::ArgumentRemoved { .. } => Severity::Info,
            Event::MalformedLine { .. } => Severity::Warning,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::UnsupportedConstruct { construct, name, line } => {
                write!(f, "{} `{}` at line {} is not supported", construct, name, line)
            },
            Event::TypeConflict { name, resolved } => {
                write!(f, "type conflict on `{}`: {}", name, resolved)
            },
            Event::ValueConflict { name, resolved } => {
                write!(f, "value conflict on `{}`: {}", name, resolved)
            },
            Event::ArgumentAdded { function, argument } => {
                write!(f, "argument added to `{}`: {}", function, argument)
            },
            Event::ArgumentRemoved { function, argument } => {
                write!(f, "argument removed from `{}`: {}", function, argument)
            },
            Event::MalformedLine { text } => {
                write!(f, "malformed declaration line: {}", text)
            },
        }
    }
}

/// Accumulates [`Event`]s for one inference/read/merge pass.
#[derive(Debug, Default)]
pub struct Diagnostics {
    events: Vec<Event>,
}

impl Diagnostics {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event and mirrors it to the `log` crate.
    pub fn report(&mut self, event: Event) {
        match event.severity() {
            Severity::Info => log::info!("{}", event),
            Severity::Warning => log::warn!("{}", event),
            Severity::Error => log::error!("{}", event),
        }
        self.events.push(event);
    }

    /// All recorded events, in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of warning-severity events (conflicts, malformed lines).
    pub fn warning_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.severity() == Severity::Warning)
            .count()
    }

    /// True if no events were recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        let conflict = Event::TypeConflict {
            name: "x".to_string(),
            resolved: "__conflict__type__: \"long\" \"list\"".to_string(),
        };
        assert_eq!(conflict.severity(), Severity::Warning);

        let removed = Event::ArgumentRemoved {
            function: "f".to_string(),
            argument: "a".to_string(),
        };
        assert_eq!(removed.severity(), Severity::Info);
    }

    #[test]
    fn test_warning_count() {
        let mut diag = Diagnostics::new();
        assert!(diag.is_empty());

        diag.report(Event::ArgumentAdded { function: "f".into(), argument: "a".into() });
        diag.report(Event::ValueConflict { name: "x".into(), resolved: "…".into() });
        assert_eq!(diag.events().len(), 2);
        assert_eq!(diag.warning_count(), 1);
    }
}
