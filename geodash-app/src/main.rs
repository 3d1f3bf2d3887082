use geodash::prelude::*;

const SAMPLE_UPLOAD: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature", "properties": {"name": "Connaught Place"},
         "geometry": {"type": "Point", "coordinates": [77.2167, 28.6315]}}
    ]
}"#;

/// Drives the dashboard engine against the headless map:
///
/// `geodash-app [config.json] [--http]`
///
/// Without `--http` the bundled demo datasets are served from memory.
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    geodash::init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let use_http = args.iter().any(|a| a == "--http");
    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => MapConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => MapConfig::default(),
    };

    let source: Arc<dyn DataSource> = if use_http {
        log::info!("fetching datasets from {}", config.datasets.base_url);
        Arc::new(HttpDataSource::new(config.datasets.clone()))
    } else {
        Arc::new(StaticDataSource::mock()?)
    };

    let mut controller = SyncController::mount(config, HeadlessMap::new, source, |action| {
        match serde_json::to_string(&action) {
            Ok(json) => println!("📣 {}", json),
            Err(e) => log::warn!("unprintable action: {}", e),
        }
    });

    let registered = controller.initialize().await?;
    println!("✅ {} layers registered", registered);

    let mut state = AppStateSnapshot::default();
    state.toggle_layer("metro-lines");
    state.set_layer_visibility("contours", true);
    let issued = controller.apply_state(&state);
    println!("🔄 state applied with {} mutations", issued);

    // Central Delhi
    controller.handle_event(MapEvent::PointerMove {
        lng_lat: LatLng::new(28.645, 77.225),
    });
    controller.handle_event(MapEvent::Click {
        lng_lat: LatLng::new(28.645, 77.225),
    });
    if let Some(popup) = controller.popup() {
        println!("💬 popup at {:.4}, {:.4}: {}", popup.lng_lat.lat, popup.lng_lat.lng, popup.html);
    }

    match controller.add_uploaded_layer("landmarks.geojson", SAMPLE_UPLOAD) {
        Ok(descriptor) => {
            println!("📁 uploaded {} as {}", descriptor.name, descriptor.id);
            state.uploaded_layers.push(descriptor);
        }
        Err(e) => println!("❌ upload failed: {}", e),
    }
    state = state.with_theme(Theme::dark());
    controller.apply_state(&state);

    if let Some(map) = controller.map() {
        println!("\n🗺️  layers (bottom to top):");
        for id in map.layer_ids() {
            let visibility = map.layout_visibility(id).unwrap_or(Visibility::None);
            println!("   {:<28} {}", id, visibility.as_str());
        }
        println!("   {} mutations issued in total", map.mutation_count());
    }

    controller.unmount();
    Ok(())
}
