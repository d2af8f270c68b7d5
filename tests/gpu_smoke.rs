//! Renders one frame on a real adapter. Skips when none is available.

use voxel_chunk_engine::engine_state::config::EngineConfig;
use voxel_chunk_engine::engine_state::{request_offscreen_device, EngineState};

#[test]
fn renders_a_frame_when_an_adapter_exists() {
    let Some((device, queue)) = request_offscreen_device() else {
        eprintln!("no graphics adapter, skipping");
        return;
    };

    let config = EngineConfig::from_json_str(
        r#"{
            "chunk": { "dim": 8, "height": 16 },
            "world": { "radius": 2, "terrain": { "kind": "flat", "height": 2, "block": "grass" } },
            "render": { "width": 64, "height": 48, "eye": [-20.0, 20.0, -20.0], "target": [4.0, 1.0, 4.0] }
        }"#,
    )
    .unwrap();
    let engine = EngineState::with_device(config, device, queue).unwrap();
    assert!(engine.has_renderer());

    let frame = engine.render_frame().unwrap().expect("renderer is present");
    assert_eq!((frame.width(), frame.height()), (64, 48));

    let first = *frame.get_pixel(0, 0);
    assert!(frame.pixels().any(|pixel| *pixel != first));
}
