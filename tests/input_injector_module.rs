use std::time::{Duration, Instant};
use vmforge::input::{
    plan_keystrokes, BootCommandData, InputError, InputInjector, KeyEncoding, KeyEvent, KeySink,
    PlannedInput, Token, TypeOutcome, WaitDurations,
};
use vmforge::pipeline::CancelToken;

fn quick_waits() -> WaitDurations {
    WaitDurations {
        short: Duration::from_millis(20),
        medium: Duration::from_millis(100),
        long: Duration::from_millis(200),
    }
}

fn data() -> BootCommandData {
    BootCommandData::new("10.0.2.2", 8080, "box")
}

struct TimedSink {
    events: Vec<(Instant, KeyEvent)>,
    cancel_after: Option<(usize, CancelToken)>,
}

impl TimedSink {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            cancel_after: None,
        }
    }

    fn cancelling_after(events: usize, token: CancelToken) -> Self {
        Self {
            events: Vec::new(),
            cancel_after: Some((events, token)),
        }
    }

    fn pressed_chars(&self) -> String {
        self.events
            .iter()
            .filter(|(_, event)| event.pressed)
            .filter_map(|(_, event)| char::from_u32(event.code))
            .collect()
    }
}

impl KeySink for TimedSink {
    fn encoding(&self) -> KeyEncoding {
        KeyEncoding::Keysym
    }

    fn send(&mut self, event: KeyEvent) -> Result<(), InputError> {
        self.events.push((Instant::now(), event));
        if let Some((limit, token)) = &self.cancel_after {
            if self.events.len() == *limit {
                token.cancel();
            }
        }
        Ok(())
    }
}

#[test]
fn name_then_pause_then_ip_in_order() {
    let rendered = "box wait5 10.0.2.2";
    let plan = plan_keystrokes(rendered, KeyEncoding::Keysym, &quick_waits()).expect("plan");

    let pause_at = plan
        .iter()
        .position(|input| matches!(input, PlannedInput::Pause(_)))
        .expect("pause planned");
    assert_eq!(plan[pause_at], PlannedInput::Pause(Duration::from_millis(100)));

    let typed = |inputs: &[PlannedInput]| -> String {
        inputs
            .iter()
            .map(|input| match input {
                PlannedInput::Keys {
                    token: Token::Char(ch),
                    ..
                } => *ch,
                other => panic!("unexpected input {other:?}"),
            })
            .collect()
    };
    assert_eq!(typed(&plan[..pause_at]), "box");
    assert_eq!(typed(&plan[pause_at + 1..]), "10.0.2.2");
}

#[test]
fn template_typing_pauses_between_name_and_ip() {
    let injector = InputInjector::new(data(), quick_waits());
    let mut sink = TimedSink::new();

    let outcome = injector
        .type_command(&mut sink, "{{.Name}} wait5 {{.HTTPIP}}", &CancelToken::new())
        .expect("type");

    assert_eq!(outcome, TypeOutcome::Completed);
    assert_eq!(sink.pressed_chars(), "box10.0.2.2");
    let last_name_event = sink.events[5].0;
    let first_ip_event = sink.events[6].0;
    assert!(first_ip_event.duration_since(last_name_event) >= Duration::from_millis(100));
}

#[test]
fn cancellation_after_third_character_sends_exactly_three() {
    let cancel = CancelToken::new();
    let injector = InputInjector::new(data(), quick_waits());
    let mut sink = TimedSink::cancelling_after(6, cancel.clone());

    let outcome = injector
        .type_command(&mut sink, "abcdefghij", &cancel)
        .expect("type");

    assert_eq!(outcome, TypeOutcome::Cancelled);
    assert_eq!(sink.events.len(), 6);
    assert_eq!(sink.pressed_chars(), "abc");
}

#[test]
fn template_errors_abort_before_any_key() {
    let injector = InputInjector::new(data(), quick_waits());
    let mut sink = TimedSink::new();

    let err = injector
        .type_command(&mut sink, "linux {{ .Missing }}<enter>", &CancelToken::new())
        .expect_err("bad template");

    assert!(matches!(err, InputError::Template { .. }));
    assert!(sink.events.is_empty());
}

#[test]
fn special_keys_and_shifted_characters() {
    let injector = InputInjector::new(data(), quick_waits());
    let mut sink = TimedSink::new();

    injector
        .type_command(&mut sink, "A<enter>", &CancelToken::new())
        .expect("type");

    let codes: Vec<(u32, bool)> = sink
        .events
        .iter()
        .map(|(_, event)| (event.code, event.pressed))
        .collect();
    assert_eq!(
        codes,
        vec![
            (0xffe1, true),
            (0x41, true),
            (0x41, false),
            (0xffe1, false),
            (0xff0d, true),
            (0xff0d, false),
        ]
    );
}
