//! Behavioural properties of the prelude helpers

// Tests are allowed to use expect/unwrap for cleaner error messages
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use chatscript_core::prelude::*;
use std::sync::Arc;

#[test]
fn ease_out_snaps_inside_one_jump() {
    let jumps = [0.5, 1.0, 2.0, 10.0];
    let speeds = [-4.0, -1.0, 0.5, 2.0, 7.0];
    for jump in jumps {
        for speed in speeds {
            for offset in [0.0, 0.1, 0.49, -0.2, -0.45] {
                let start = 42.0 + offset * jump;
                let result = ease_out(start, 42.0, speed, jump).expect("nonzero speed");
                assert_eq!(result, 42.0, "start={start} speed={speed} jump={jump}");
            }
        }
    }
}

#[test]
fn ease_out_moves_toward_target_without_overshoot() {
    for speed in [1.5, 2.0, 3.0, 10.0, -10.0] {
        for (start, finish) in [(0.0, 10.0), (10.0, 0.0), (-3.0, 3.0), (1e6, -1e6)] {
            let next = ease_out(start, finish, speed, 1.0).unwrap();
            if speed > 1.0 {
                let (lo, hi) = if start < finish { (start, finish) } else { (finish, start) };
                assert!(next > lo && next < hi, "{start} -> {finish} at {speed} gave {next}");
            } else {
                // Negative speeds move away from the target
                assert!((next - finish).abs() > (start - finish).abs());
            }
        }
    }
}

#[test]
fn ease_out_reaches_target_within_hundred_steps() {
    for speed in [1.1, 2.0, 5.0, 10.0] {
        let mut value = -250.0;
        let mut reached = false;
        for _ in 0..100 {
            value = ease_out(value, 250.0, speed, 1.0).unwrap();
            if value == 250.0 {
                reached = true;
                break;
            }
        }
        assert!(reached, "speed {speed} did not converge, stopped at {value}");
    }
}

#[test]
fn ease_out_documented_examples() {
    assert_eq!(ease_out(0.0, 10.0, 2.0, DEFAULT_JUMP), Ok(5.0));
    assert_eq!(ease_out(9.6, 10.0, 2.0, 1.0), Ok(10.0));
    assert_eq!(ease_out(1.0, 9.0, 0.0, 1.0), Err(PreludeError::DivideByZero));
}

#[test]
fn rust_callbacks_cancel_chat() {
    type Handler = Box<dyn Fn(&mut Event) -> Result<()>>;

    let registry: TriggerRegistry<Handler> =
        TriggerRegistry::new(Arc::new(TriggerCatalog::standard()));

    registry
        .register("chat", Box::new(|event: &mut Event| cancel(event)))
        .unwrap()
        .set_criteria(Criteria::parse("${*}spam${*}"))
        .unwrap();

    let spec = registry.catalog().resolve("chat").unwrap();

    let mut payload = Payload::new();
    payload.insert("message".into(), "buy spam now".into());
    let mut spam = Event::new(spec, payload).unwrap();
    let summary = registry
        .dispatch(&mut spam, |_, handler, event| handler(event))
        .unwrap();
    assert_eq!(summary.invoked, 1);
    assert!(summary.canceled);

    let mut payload = Payload::new();
    payload.insert("message".into(), "hello".into());
    let mut hello = Event::new(spec, payload).unwrap();
    let summary = registry
        .dispatch(&mut hello, |_, handler, event| handler(event))
        .unwrap();
    assert_eq!(summary.invoked, 0);
    assert!(!summary.canceled);
}

#[test]
fn custom_vocabulary_replaces_standard() {
    let catalog = TriggerCatalog::new(vec![
        TriggerSpec::new("frame").with_payload(&["dt"]),
        TriggerSpec::new("chat").cancelable().with_subject("message"),
    ])
    .unwrap();
    let registry: TriggerRegistry<()> = TriggerRegistry::new(Arc::new(catalog));

    assert!(registry.register("frame", ()).is_ok());
    assert_eq!(
        registry.register("tick", ()).map(|h| h.id()),
        Err(PreludeError::UnknownTriggerType("tick".into()))
    );
}
