//! Cross-crate scenario: observables feeding a bound collection pair, with
//! events delegated up to an application-level emitter.

use std::sync::{Arc, Mutex};

use serde_json::json;
use vellum_reactive::{Collection, Emits, Emitter, Observable};

#[test]
fn view_list_tracks_model_list_and_settings() {
	// Shared settings propagated to each view through a binding.
	let settings = Observable::new();
	settings.set("theme", json!("light")).unwrap();

	let models = Collection::new();
	models
		.add_many(
			vec![
				json!({ "id": "doc-1", "title": "First", "draft": false }),
				json!({ "id": "doc-2", "title": "Hidden", "draft": true }),
				json!({ "id": "doc-3", "title": "Third", "draft": false }),
			],
			None,
		)
		.unwrap();

	// Views mirror non-draft models only.
	let views = Collection::new();
	views
		.bind_to(&models)
		.unwrap()
		.using(|model| {
			if model["draft"] == json!(true) {
				None
			} else {
				Some(json!({ "id": model["id"], "label": model["title"] }))
			}
		})
		.unwrap();
	assert_eq!(views.len(), 2);
	assert_eq!(views.get(1).unwrap()["label"], json!("Third"));

	// Each view observable binds its theme to the shared settings.
	let first_view = Observable::new();
	first_view.bind(&["theme"]).unwrap().to(&settings).unwrap();
	assert_eq!(first_view.get("theme"), Some(json!("light")));

	settings.set("theme", json!("dark")).unwrap();
	assert_eq!(first_view.get("theme"), Some(json!("dark")));

	// Collection events delegate up to an application hub.
	let app = Emitter::new();
	views.delegate(&["add", "remove"]).to(&app);

	let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
	let sink = seen.clone();
	app.on("add", move |record, args| {
		sink.lock().unwrap().push(format!(
			"{} {}",
			record.name(),
			args[0]["id"].as_str().unwrap()
		));
	});

	// A non-draft model lands between the existing views and the delegated
	// event reaches the hub.
	models
		.add_at(json!({ "id": "doc-4", "title": "Fourth", "draft": false }), 2)
		.unwrap();
	assert_eq!(
		views.map(|view| view["id"].as_str().unwrap().to_owned()),
		["doc-1", "doc-4", "doc-3"]
	);
	assert_eq!(*seen.lock().unwrap(), ["add doc-4"]);
}
