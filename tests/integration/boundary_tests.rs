use futures::executor::block_on;
use tracked_value::{Boundary, Renderer, TestRenderer, Value, ValueState};

fn given_a_counter_boundary(
    count: &Value<i32, String>,
) -> (
    Boundary<Option<i32>, impl FnMut() -> Option<i32>, TestRenderer<Option<i32>>>,
    TestRenderer<Option<i32>>,
) {
    let renderer = TestRenderer::new();
    let reader = count.clone();
    let boundary = Boundary::new(move || reader.last_known_value(), renderer.clone());
    (boundary, renderer)
}

#[test]
fn given_a_new_boundary_should_not_build_until_mounted() {
    let count: Value<i32, String> = Value::new(0);
    let (mut boundary, renderer) = given_a_counter_boundary(&count);

    assert!(!boundary.is_mounted());
    assert_eq!(renderer.count(), 0);
    assert_eq!(count.listener_count(), 0);

    boundary.mount();
    boundary.mount();

    assert!(boundary.is_mounted());
    assert_eq!(boundary.build_count(), 1);
    assert_eq!(count.listener_count(), 1);
    renderer.with_renders(|renders| {
        assert_eq!(renders, &vec![Some(0)]);
    });
}

#[test]
fn given_a_mutation_without_notify_should_not_rebuild() {
    let count: Value<i32, String> = Value::new(0);
    let (mut boundary, renderer) = given_a_counter_boundary(&count);
    boundary.mount();

    count.set_value(5);

    assert!(!boundary.process_rebuilds());
    assert_eq!(renderer.count(), 1);
}

#[test]
fn given_a_notify_should_rebuild_with_the_new_state() {
    let count: Value<i32, String> = Value::new(0);
    let (mut boundary, renderer) = given_a_counter_boundary(&count);
    boundary.mount();

    count.set_value(5);
    count.notify();
    assert!(boundary.process_rebuilds());

    count.set_waiting();
    count.notify();
    assert!(boundary.process_rebuilds());

    renderer.with_renders(|renders| {
        assert_eq!(renders, &vec![Some(0), Some(5), None]);
    });
}

#[test]
fn given_several_notifies_before_processing_should_rebuild_once() {
    let count: Value<i32, String> = Value::new(0);
    let (mut boundary, renderer) = given_a_counter_boundary(&count);
    boundary.mount();

    for n in 1..=3 {
        count.set_value(n);
        count.notify();
    }

    assert!(boundary.process_rebuilds());
    assert!(!boundary.process_rebuilds());
    assert_eq!(boundary.build_count(), 2);
    assert_eq!(renderer.last(), Some(Some(3)));
}

#[test]
fn given_a_conditional_read_should_only_track_the_latest_build() {
    let show_left: Value<bool, ()> = Value::new(true);
    let left: Value<&'static str, ()> = Value::new("left");
    let right: Value<&'static str, ()> = Value::new("right");
    let renderer = TestRenderer::new();

    let (flag, l, r) = (show_left.clone(), left.clone(), right.clone());
    let mut boundary = Boundary::new(
        move || {
            if flag.last_known_value() == Some(true) {
                l.last_known_value()
            } else {
                r.last_known_value()
            }
        },
        renderer.clone(),
    );
    boundary.mount();
    assert_eq!(left.listener_count(), 1);
    assert_eq!(right.listener_count(), 0);

    show_left.set_value(false);
    show_left.notify();
    assert!(boundary.process_rebuilds());

    assert_eq!(left.listener_count(), 0);
    assert_eq!(right.listener_count(), 1);
    assert_eq!(boundary.subscriber().subscription_count(), 2);

    left.notify();
    assert!(!boundary.process_rebuilds());
    assert_eq!(renderer.last(), Some(Some("right")));
}

#[test]
fn given_an_unmounted_boundary_should_ignore_stale_notifies() {
    let count: Value<i32, String> = Value::new(0);
    let (mut boundary, renderer) = given_a_counter_boundary(&count);
    boundary.mount();

    boundary.unmount();
    count.set_value(1);
    count.notify();

    assert!(!boundary.is_mounted());
    assert!(!boundary.subscriber().is_live());
    assert!(!boundary.process_rebuilds());
    assert_eq!(count.listener_count(), 0);
    assert_eq!(renderer.count(), 1);

    boundary.mount();
    assert_eq!(renderer.count(), 1);
}

#[test]
fn given_a_dropped_boundary_should_leave_no_listener_behind() {
    let count: Value<i32, String> = Value::new(0);
    {
        let (mut boundary, _renderer) = given_a_counter_boundary(&count);
        boundary.mount();
        assert_eq!(count.listener_count(), 1);
    }

    assert_eq!(count.listener_count(), 0);
    count.notify();
}

#[test]
fn given_a_pending_request_when_awaiting_next_rebuild_should_rebuild() {
    let count: Value<i32, String> = Value::new(0);
    let (mut boundary, renderer) = given_a_counter_boundary(&count);
    boundary.mount();

    count.set_value(9);
    count.notify();
    count.notify();

    assert!(block_on(boundary.next_rebuild()));
    assert_eq!(boundary.build_count(), 2);
    assert!(!boundary.process_rebuilds());
    assert_eq!(renderer.last(), Some(Some(9)));
}

#[test]
fn given_an_unmounted_boundary_when_awaiting_next_rebuild_should_return_immediately() {
    let count: Value<i32, String> = Value::new(0);
    let (mut boundary, _renderer) = given_a_counter_boundary(&count);

    assert!(!block_on(boundary.next_rebuild()));
}

#[test]
fn given_a_failed_load_should_render_the_failure() {
    let profile: Value<String, String> = Value::empty();
    let renderer = TestRenderer::new();

    let reader = profile.clone();
    let mut boundary = Boundary::new(
        move || match reader.current() {
            ValueState::Present(name) => name,
            ValueState::Absent => "empty".to_string(),
            ValueState::Loading => "loading".to_string(),
            ValueState::Failed(error, _) => format!("error: {error}"),
        },
        renderer.clone(),
    );
    boundary.mount();

    block_on(profile.load(async { Err::<String, _>("offline".to_string()) }));
    assert!(boundary.process_rebuilds());

    renderer.with_renders(|renders| {
        assert_eq!(renders, &vec!["empty".to_string(), "error: offline".to_string()]);
    });
    assert_eq!(boundary.build_count(), 2);
}

#[test]
fn given_a_custom_renderer_should_receive_every_build() {
    struct Lines(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

    impl Renderer<String> for Lines {
        fn render(&mut self, output: String) {
            self.0.lock().unwrap().push(output);
        }
    }

    let name: Value<&'static str, ()> = Value::new("ada");
    let lines = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

    let reader = name.clone();
    let mut boundary = Boundary::new(
        move || format!("hello {}", reader.last_known_value().unwrap_or("nobody")),
        Lines(lines.clone()),
    );
    boundary.mount();
    name.reset();
    name.notify();
    boundary.process_rebuilds();

    assert_eq!(*lines.lock().unwrap(), vec!["hello ada", "hello nobody"]);
}
