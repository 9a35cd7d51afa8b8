use super::message::Message;

/// Completion contract for non-blocking operations.
///
/// A type implementing `MessageCallback` owns the [`Message`] envelope for
/// one operation and receives exactly one terminal notification for it:
/// [`on_success`], [`on_failure`], or [`on_timeout`]. Before the
/// notification fires, the operation layer populates the envelope through
/// [`message_mut`] with whatever the outcome produced: a result payload, a
/// service rejection code, or nothing at all.
///
/// All three notification methods default to doing nothing, so an
/// implementor overrides only the outcomes it cares about. A sink that
/// overrides none of them is valid; it simply ignores its completions.
///
/// Notifications are delivered on the dispatcher thread that manages the
/// operation, never on the thread that started it. Implementations must
/// return promptly; a callback that blocks stalls every other completion
/// behind it.
///
/// [`on_success`]: MessageCallback::on_success
/// [`on_failure`]: MessageCallback::on_failure
/// [`on_timeout`]: MessageCallback::on_timeout
/// [`message_mut`]: MessageCallback::message_mut
pub trait MessageCallback: Send {
    /// The message envelope this sink owns.
    fn message(&self) -> &Message;

    /// Mutable access to the envelope, used by the operation layer to
    /// populate result fields before the terminal notification.
    fn message_mut(&mut self) -> &mut Message;

    /// The operation completed. For shadow operations the exchange
    /// itself can succeed while the service rejects the request; the
    /// rejection then arrives here, with `error_code`/`error_message`
    /// set on the envelope. Shadow callers must check those fields even
    /// on success.
    fn on_success(&mut self) {}

    /// The operation could not complete: a transport-level failure,
    /// protocol violation, or explicit rejection before any exchange
    /// took place.
    fn on_failure(&mut self) {}

    /// The operation did not complete within its timeout.
    fn on_timeout(&mut self) {}
}

/// A bare [`Message`] is a valid sink that ignores its completions.
impl MessageCallback for Message {
    fn message(&self) -> &Message {
        self
    }

    fn message_mut(&mut self) -> &mut Message {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_client::qos::Qos;

    struct CountingSink {
        message: Message,
        successes: u32,
        failures: u32,
        timeouts: u32,
    }

    impl CountingSink {
        fn new() -> Self {
            CountingSink {
                message: Message::new("t", Qos::AtMostOnce),
                successes: 0,
                failures: 0,
                timeouts: 0,
            }
        }
    }

    impl MessageCallback for CountingSink {
        fn message(&self) -> &Message {
            &self.message
        }

        fn message_mut(&mut self) -> &mut Message {
            &mut self.message
        }

        fn on_success(&mut self) {
            self.successes += 1;
        }

        fn on_failure(&mut self) {
            self.failures += 1;
        }

        fn on_timeout(&mut self) {
            self.timeouts += 1;
        }
    }

    #[test]
    fn test_plain_message_ignores_notifications() {
        let mut sink = Message::with_string_payload("t", Qos::AtLeastOnce, "hi");
        sink.on_success();
        sink.on_failure();
        sink.on_timeout();
        assert_eq!(sink.string_payload().unwrap(), Some("hi".to_string()));
    }

    #[test]
    fn test_overridden_notifications_observed() {
        let mut sink = CountingSink::new();
        sink.on_success();
        sink.on_success();
        sink.on_timeout();
        assert_eq!(sink.successes, 2);
        assert_eq!(sink.failures, 0);
        assert_eq!(sink.timeouts, 1);
    }

    #[test]
    fn test_sink_as_trait_object() {
        let mut sink: Box<dyn MessageCallback> = Box::new(CountingSink::new());
        sink.message_mut().set_payload(Some(vec![7]));
        sink.on_failure();
        assert_eq!(sink.message().payload(), Some(vec![7]));
    }
}
