use super::{counting_subscriber, subscriber_expecting};
use tracked_value::{capture, Trace, Value, ValueState};

#[test]
fn given_a_captured_read_when_set_and_notified_should_call_the_observer_once() {
    let value: Value<i32, String> = Value::new(0);
    let (observer, notifications) = counting_subscriber();

    capture(&observer, || {
        let _ = value.current();
    });

    value.set_value(42);
    value.notify();
    assert_eq!(notifications.count(), 1);

    value.reset();
    value.notify();
    assert_eq!(notifications.count(), 2);
    assert_eq!(value.last_known_value(), None);
}

#[test]
fn given_a_mocked_observer_when_notified_twice_should_expect_two_calls() {
    let value: Value<i32, String> = Value::new(0);
    let observer = subscriber_expecting(2);

    capture(&observer, || {
        let _ = value.current();
    });

    value.set_value(42);
    value.notify();
    value.reset();
    value.notify();
}

#[test]
fn given_several_mutations_when_notified_once_should_call_each_observer_once() {
    let first: Value<i32, String> = Value::new(0);
    let second: Value<i32, String> = Value::new(0);
    let (observer, notifications) = counting_subscriber();

    capture(&observer, || {
        let _ = first.current();
        let _ = second.current();
    });

    first.set_value(1);
    first.set_waiting();
    first.set_value(2);
    second.set_error("nope".to_string(), Trace::empty());
    assert_eq!(notifications.count(), 0);

    first.notify();
    assert_eq!(notifications.count(), 1);
    assert_eq!(first.peek(), ValueState::Present(2));
    assert!(second.peek().is_failed());
}

#[test]
fn given_two_observers_on_one_cell_should_call_both() {
    let value: Value<&'static str, ()> = Value::empty();
    let (left, left_notifications) = counting_subscriber();
    let (right, right_notifications) = counting_subscriber();

    capture(&left, || value.current());
    capture(&right, || value.current());
    value.notify();

    assert_eq!(left_notifications.count(), 1);
    assert_eq!(right_notifications.count(), 1);
}

#[test]
fn given_an_observer_that_reads_during_notify_should_not_deadlock() {
    let value: Value<i32, String> = Value::new(0);
    let reader = value.clone();
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let observer = tracked_value::Subscriber::new(move || {
        sink.lock().unwrap().push(reader.peek());
        let _ = reader.listener_count();
    });

    let _ = value.current_in(Some(&observer));
    value.set_value(7);
    value.notify();

    assert_eq!(*seen.lock().unwrap(), vec![ValueState::Present(7)]);
}
