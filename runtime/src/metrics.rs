//! Metric names and descriptions for the session runtime.
//!
//! The runtime only records through the `metrics` facade. Nothing is
//! exported unless the host installs a recorder; call [`register_metrics`]
//! once after installing one so the descriptions show up.

use ::metrics::describe_counter;

/// Metric names recorded by the session.
pub mod names {
    /// Actions reduced by a session
    pub const ACTIONS_SENT: &str = "session.actions.sent";
    /// Effects executed, labelled by `type`
    pub const EFFECTS_EXECUTED: &str = "session.effects.executed";
    /// Client store writes that failed, labelled by `key`
    pub const PERSIST_FAILED: &str = "session.persist.failed";
}

/// Register descriptions for every metric the runtime records.
pub fn register_metrics() {
    describe_counter!(names::ACTIONS_SENT, "Total number of actions reduced by a session");
    describe_counter!(
        names::EFFECTS_EXECUTED,
        "Total number of effects executed, by effect type"
    );
    describe_counter!(
        names::PERSIST_FAILED,
        "Total number of client store writes that failed, by record"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_without_recorder_is_a_no_op() {
        register_metrics();
        register_metrics();
    }

    #[test]
    fn names_are_namespaced_by_session() {
        for name in [names::ACTIONS_SENT, names::EFFECTS_EXECUTED, names::PERSIST_FAILED] {
            assert!(name.starts_with("session."));
        }
    }
}
