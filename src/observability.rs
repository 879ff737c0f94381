use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("matrix_chat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("matrix_chat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("matrix_chat.client.request_duration_seconds");

pub(crate) static COMPLETION_FAILURES: Counter =
    Counter::new("matrix_chat.completion.failures");
pub(crate) static CONNECT_FAILURES: Counter = Counter::new("matrix_chat.completion.connect_failures");

pub(crate) static SESSION_CREATED: Counter = Counter::new("matrix_chat.session.created");
pub(crate) static SESSION_EVICTED: Counter = Counter::new("matrix_chat.session.evicted");
pub(crate) static SESSION_SUBMISSIONS: Counter = Counter::new("matrix_chat.session.submissions");
pub(crate) static SESSION_IGNORED: Counter = Counter::new("matrix_chat.session.ignored_submissions");
pub(crate) static SESSION_BUSY: Counter = Counter::new("matrix_chat.session.busy");
pub(crate) static SESSION_ROUND_DURATION: Moments =
    Moments::new("matrix_chat.session.round_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: &Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&COMPLETION_FAILURES);
    collector.register_counter(&CONNECT_FAILURES);

    collector.register_counter(&SESSION_CREATED);
    collector.register_counter(&SESSION_EVICTED);
    collector.register_counter(&SESSION_SUBMISSIONS);
    collector.register_counter(&SESSION_IGNORED);
    collector.register_counter(&SESSION_BUSY);
    collector.register_moments(&SESSION_ROUND_DURATION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration() {
        let collector = Collector::new();
        register_biometrics(&collector);
    }
}
