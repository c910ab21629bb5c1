use std::sync::Arc;
use std::sync::Mutex;

use serde_json::{Value, json};

use super::{Emits, Emitter, Priority};

/// Shared log of which listeners ran, in order.
fn log() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&super::EventRecord, &[Value]) + Send + Sync>) {
	let entries = Arc::new(Mutex::new(Vec::new()));
	let make = {
		let entries = entries.clone();
		move |tag: &str| -> Box<dyn Fn(&super::EventRecord, &[Value]) + Send + Sync> {
			let entries = entries.clone();
			let tag = tag.to_string();
			Box::new(move |_, _| entries.lock().unwrap().push(tag.clone()))
		}
	};
	(entries, make)
}

#[test]
fn listeners_run_in_priority_order_with_stable_ties() {
	let emitter = Emitter::new();
	let (entries, tagged) = log();

	emitter.on("go", tagged("normal-1"));
	emitter.on_prio("go", Priority::HIGH, tagged("high"));
	emitter.on_prio("go", Priority::LOW, tagged("low"));
	emitter.on("go", tagged("normal-2"));
	emitter.on_prio("go", Priority::HIGHEST, tagged("highest"));
	emitter.on_prio("go", Priority::of(500), tagged("custom-500"));

	emitter.fire("go", &[]);

	assert_eq!(
		*entries.lock().unwrap(),
		["highest", "high", "custom-500", "normal-1", "normal-2", "low"]
	);
}

#[test]
fn namespace_levels_union_in_one_pass() {
	let emitter = Emitter::new();
	let (entries, tagged) = log();

	emitter.on("a", tagged("a"));
	emitter.on("a:b", tagged("a:b"));
	emitter.on("a:b:c", tagged("a:b:c"));

	emitter.fire("a:b:c", &[]);
	assert_eq!(*entries.lock().unwrap(), ["a", "a:b", "a:b:c"]);

	entries.lock().unwrap().clear();
	emitter.fire("a:b", &[]);
	assert_eq!(*entries.lock().unwrap(), ["a", "a:b"]);

	// Never-registered leaf falls back to the nearest ancestor.
	entries.lock().unwrap().clear();
	emitter.fire("a:x", &[]);
	assert_eq!(*entries.lock().unwrap(), ["a"]);
}

#[test]
fn namespace_union_respects_priority_not_depth() {
	let emitter = Emitter::new();
	let (entries, tagged) = log();

	emitter.on_prio("deep:deeper", Priority::LOW, tagged("specific-low"));
	emitter.on_prio("deep", Priority::HIGH, tagged("generic-high"));

	emitter.fire("deep:deeper", &[]);
	assert_eq!(*entries.lock().unwrap(), ["generic-high", "specific-low"]);
}

#[test]
fn later_namespace_registration_inherits_ancestor_listeners() {
	let emitter = Emitter::new();
	let (entries, tagged) = log();

	// `root` exists before `root:leaf` is ever mentioned.
	emitter.on("root", tagged("root"));
	emitter.on("root:leaf", tagged("leaf"));

	emitter.fire("root:leaf", &[]);
	assert_eq!(*entries.lock().unwrap(), ["root", "leaf"]);
}

#[test]
fn listener_added_during_dispatch_waits_for_next_fire() {
	let emitter = Emitter::new();
	let calls = Arc::new(Mutex::new(Vec::new()));

	{
		let emitter2 = emitter.clone();
		let calls = calls.clone();
		emitter.on("evt", move |_, _| {
			calls.lock().unwrap().push("outer");
			let inner_calls = calls.clone();
			emitter2.on("evt", move |_, _| {
				inner_calls.lock().unwrap().push("inner");
			});
		});
	}

	emitter.fire("evt", &[]);
	assert_eq!(*calls.lock().unwrap(), ["outer"]);

	emitter.fire("evt", &[]);
	assert_eq!(*calls.lock().unwrap(), ["outer", "outer", "inner"]);
}

#[test]
fn listener_removed_during_dispatch_is_skipped() {
	let emitter = Emitter::new();
	let (entries, tagged) = log();

	let second = emitter.on("evt", tagged("second"));
	{
		let emitter2 = emitter.clone();
		let entries = entries.clone();
		emitter.on_prio("evt", Priority::HIGH, move |_, _| {
			entries.lock().unwrap().push("first".into());
			emitter2.off(second);
		});
	}

	emitter.fire("evt", &[]);
	assert_eq!(*entries.lock().unwrap(), ["first"]);
}

#[test]
fn record_off_deregisters_current_listener() {
	let emitter = Emitter::new();
	let count = Arc::new(Mutex::new(0));
	{
		let count = count.clone();
		emitter.on("evt", move |record, _| {
			*count.lock().unwrap() += 1;
			record.off();
		});
	}

	emitter.fire("evt", &[]);
	emitter.fire("evt", &[]);
	assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn self_removal_scrubs_the_owner_bookkeeping() {
	let owner = Emitter::new();
	let target = Emitter::new();

	let count = Arc::new(Mutex::new(0));
	{
		let count = count.clone();
		owner.listen_to(&target, "evt", move |record, _| {
			*count.lock().unwrap() += 1;
			record.off();
		});
	}
	owner.listen_to(&target, "other", |_, _| {});
	assert_eq!(owner.owned_registrations(), 2);

	target.fire("evt", &[]);
	target.fire("evt", &[]);
	assert_eq!(*count.lock().unwrap(), 1);
	// The self-removed registration is gone from the owner's index too.
	assert_eq!(owner.owned_registrations(), 1);

	// `once` registrations are forgotten the same way.
	owner.once("local", |_, _| {});
	assert_eq!(owner.owned_registrations(), 2);
	owner.fire("local", &[]);
	assert_eq!(owner.owned_registrations(), 1);
}

#[test]
fn once_is_idempotent_under_nested_refire() {
	let emitter = Emitter::new();
	let count = Arc::new(Mutex::new(0));
	{
		let emitter2 = emitter.clone();
		let count = count.clone();
		emitter.once("evt", move |_, _| {
			*count.lock().unwrap() += 1;
			// Re-entrant fire of the same event must not run us again.
			emitter2.fire("evt", &[]);
		});
	}

	emitter.fire("evt", &[]);
	emitter.fire("evt", &[]);
	assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn stop_halts_remaining_listeners() {
	let emitter = Emitter::new();
	let (entries, tagged) = log();

	{
		let entries = entries.clone();
		emitter.on_prio("evt", Priority::HIGH, move |record, _| {
			entries.lock().unwrap().push("stopper".into());
			record.stop();
		});
	}
	emitter.on("evt", tagged("unreached"));

	emitter.fire("evt", &[]);
	assert_eq!(*entries.lock().unwrap(), ["stopper"]);
}

#[test]
fn return_value_flows_out_of_fire() {
	let emitter = Emitter::new();
	emitter.on("question", |record, _| record.set_return(json!(41)));
	// Later listener overwrites the earlier value.
	emitter.on_prio("question", Priority::LOW, |record, _| {
		record.set_return(json!(42));
	});

	assert_eq!(emitter.fire("question", &[]), Some(json!(42)));
	assert_eq!(emitter.fire("unheard", &[]), None);
}

#[test]
fn args_reach_listeners() {
	let emitter = Emitter::new();
	let seen = Arc::new(Mutex::new(Vec::new()));
	{
		let seen = seen.clone();
		emitter.on("data", move |_, args| {
			seen.lock().unwrap().extend(args.iter().cloned());
		});
	}

	emitter.fire("data", &[json!("x"), json!(7)]);
	assert_eq!(*seen.lock().unwrap(), [json!("x"), json!(7)]);
}

#[test]
fn listen_to_and_scoped_stop_listening() {
	let listener = Emitter::new();
	let target = Emitter::new();
	let (entries, tagged) = log();

	listener.listen_to(&target, "a", tagged("a"));
	listener.listen_to(&target, "b", tagged("b"));

	target.fire("a", &[]);
	target.fire("b", &[]);
	assert_eq!(*entries.lock().unwrap(), ["a", "b"]);

	listener.stop_listening_event(&target, "a");
	target.fire("a", &[]);
	target.fire("b", &[]);
	assert_eq!(*entries.lock().unwrap(), ["a", "b", "b"]);

	listener.stop_listening(&target);
	target.fire("b", &[]);
	assert_eq!(*entries.lock().unwrap(), ["a", "b", "b"]);

	// Unregistered combinations are no-ops, not errors.
	listener.stop_listening(&target);
	listener.stop_listening_event(&target, "never");
	listener.off(999_999);
}

#[test]
fn stop_listening_all_detaches_everything() {
	let listener = Emitter::new();
	let first = Emitter::new();
	let second = Emitter::new();
	let (entries, tagged) = log();

	listener.listen_to(&first, "x", tagged("first"));
	listener.listen_to(&second, "y", tagged("second"));
	listener.stop_listening_all();

	first.fire("x", &[]);
	second.fire("y", &[]);
	assert!(entries.lock().unwrap().is_empty());
}

#[test]
fn delegation_path_accumulates_per_hop() {
	let a = Emitter::new();
	let b = Emitter::new();
	let c = Emitter::new();

	b.delegate(&["foo"]).to(&a);
	a.delegate(&["foo"]).to(&c);

	let paths = Arc::new(Mutex::new(Vec::new()));
	{
		let paths = paths.clone();
		let b2 = b.clone();
		a.on("foo", move |record, _| {
			if record.source() == &b2 {
				paths.lock().unwrap().push(("a", record.path()));
			}
		});
	}
	{
		let paths = paths.clone();
		c.on("foo", move |record, _| {
			paths.lock().unwrap().push(("c", record.path()));
		});
	}

	// Fired from B: A observes (B, A); C observes (B, A, C).
	b.fire("foo", &[]);
	{
		let seen = paths.lock().unwrap();
		assert_eq!(seen.len(), 2);
		assert_eq!(seen[0], ("a", vec![b.clone(), a.clone()]));
		assert_eq!(seen[1], ("c", vec![b.clone(), a.clone(), c.clone()]));
	}

	// Fired directly from A: C observes (A, C) — per-hop, not global.
	paths.lock().unwrap().clear();
	a.fire("foo", &[]);
	{
		let seen = paths.lock().unwrap();
		assert_eq!(seen.len(), 1);
		assert_eq!(seen[0], ("c", vec![a.clone(), c.clone()]));
	}
}

#[test]
fn delegation_renames_fixed_and_mapped() {
	let source = Emitter::new();
	let fixed = Emitter::new();
	let mapped = Emitter::new();
	let (entries, tagged) = log();

	source.delegate(&["ping"]).to_named(&fixed, "pong");
	source
		.delegate(&["ping"])
		.to_mapped(&mapped, |name| format!("relayed:{name}"));

	fixed.on("pong", tagged("fixed"));
	mapped.on("relayed:ping", tagged("mapped"));

	source.fire("ping", &[]);
	assert_eq!(*entries.lock().unwrap(), ["fixed", "mapped"]);
}

#[test]
fn wildcard_delegation_forwards_everything() {
	let source = Emitter::new();
	let sink = Emitter::new();
	let (entries, tagged) = log();

	source.delegate(&["*"]).to(&sink);
	sink.on("one", tagged("one"));
	sink.on("two", tagged("two"));

	source.fire("one", &[]);
	source.fire("two", &[]);
	assert_eq!(*entries.lock().unwrap(), ["one", "two"]);
}

#[test]
fn delegation_fires_without_local_listeners() {
	let source = Emitter::new();
	let sink = Emitter::new();
	let (entries, tagged) = log();

	source.delegate(&["quiet"]).to(&sink);
	sink.on("quiet", tagged("sink"));

	source.fire("quiet", &[]);
	assert_eq!(*entries.lock().unwrap(), ["sink"]);
}

#[test]
fn stopped_dispatch_skips_delegation() {
	let source = Emitter::new();
	let sink = Emitter::new();
	let (entries, tagged) = log();

	source.delegate(&["evt"]).to(&sink);
	source.on("evt", |record, _| record.stop());
	sink.on("evt", tagged("leaked"));

	source.fire("evt", &[]);
	assert!(entries.lock().unwrap().is_empty());
}

#[test]
fn delegated_return_values_stay_isolated() {
	let source = Emitter::new();
	let sink = Emitter::new();

	source.delegate(&["evt"]).to(&sink);
	sink.on("evt", |record, _| record.set_return(json!("from-sink")));

	// The sink's listener answered its own record, not ours.
	assert_eq!(source.fire("evt", &[]), None);
}

#[test]
fn stop_delegating_scopes() {
	let source = Emitter::new();
	let a = Emitter::new();
	let b = Emitter::new();
	let (entries, tagged) = log();

	source.delegate(&["evt"]).to(&a).to(&b);
	a.on("evt", tagged("a"));
	b.on("evt", tagged("b"));

	source.stop_delegating_to("evt", &a);
	source.fire("evt", &[]);
	assert_eq!(*entries.lock().unwrap(), ["b"]);

	source.stop_delegating_event("evt");
	source.fire("evt", &[]);
	assert_eq!(*entries.lock().unwrap(), ["b"]);

	source.delegate(&["evt"]).to(&a);
	source.stop_delegating();
	source.fire("evt", &[]);
	assert_eq!(*entries.lock().unwrap(), ["b"]);

	// No-op scopes.
	source.stop_delegating_to("never", &a);
	source.stop_delegating_event("never");
}

#[test]
fn emits_trait_forwards_to_embedded_emitter() {
	struct Widget {
		emitter: Emitter,
	}
	impl Emits for Widget {
		fn emitter(&self) -> &Emitter {
			&self.emitter
		}
	}

	let widget = Widget {
		emitter: Emitter::new(),
	};
	let (entries, tagged) = log();
	widget.on("show", tagged("shown"));
	widget.fire("show", &[]);
	assert_eq!(*entries.lock().unwrap(), ["shown"]);
}
