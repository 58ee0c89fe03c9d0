//! End-to-end offline rendering through the full graph.

use std::fs;
use std::sync::Arc;

use engine_core::scene::ReverbConfig;
use engine_core::AudioData;
use settings::Settings;
use soundfield::Engine;

fn tone_buffer(sample_rate: u32, seconds: f32) -> Arc<AudioData> {
    let frames = (sample_rate as f32 * seconds) as usize;
    let samples: Vec<f32> = (0..frames)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.5)
        .collect();
    Arc::new(AudioData::new(sample_rate, vec![samples]))
}

fn energy(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s * s).sum()
}

fn engine_with_assets(dir: &std::path::Path) -> Engine {
    let settings = Settings {
        asset_dir: dir.to_string_lossy().to_string(),
        ..Settings::default()
    };
    Engine::new(settings)
}

/// Write a small impulse manifest plus a real impulse WAV into `dir`.
fn seed_assets(dir: &std::path::Path) {
    let sample_rate = 48_000u32;
    let frames = 4_800;
    let impulse: Vec<f32> = (0..frames)
        .map(|i| {
            let t = i as f32 / frames as f32;
            (1.0 - t) * if i % 97 == 0 { 0.8 } else { 0.01 }
        })
        .collect();
    let wav = audio_io::encode_stereo_pcm16(&impulse, &impulse, sample_rate);
    fs::write(dir.join("room.wav"), wav).unwrap();

    let manifest = serde_json::json!({
        "presets": [{
            "id": "room",
            "label": "Test Room",
            "file": "room.wav",
            "decaySeconds": 0.1,
            "recommendedPreDelay": 0.02,
            "defaultEarlyMix": 0.5,
            "defaultReverbMix": 0.6,
            "defaultWidth": 1.0
        }]
    });
    fs::write(dir.join("impulses.json"), manifest.to_string()).unwrap();
}

#[tokio::test]
async fn offline_render_produces_audio_with_tail() {
    let dir = tempfile::tempdir().unwrap();
    seed_assets(dir.path());
    let engine = engine_with_assets(dir.path());

    let input = tone_buffer(48_000, 0.25);
    let input_frames = input.frames();
    let config = ReverbConfig {
        preset_id: Some("room".to_string()),
        ..ReverbConfig::default()
    };

    let rendered = engine.render_offline(input, &config).await.unwrap();
    assert_eq!(rendered.sample_rate, 48_000);
    let (left, right) = rendered.stereo().unwrap();
    assert_eq!(left.len(), right.len());
    assert!(
        left.len() > input_frames,
        "render should include the reverb tail ({} vs {})",
        left.len(),
        input_frames
    );
    assert!(energy(left) > 1e-3);
    assert!(energy(right) > 1e-3);
}

#[tokio::test]
async fn missing_manifest_falls_back_to_procedural_impulse() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_assets(dir.path());

    let config = ReverbConfig {
        preset_id: Some("does-not-exist".to_string()),
        ..ReverbConfig::default()
    };
    let rendered = engine
        .render_offline(tone_buffer(48_000, 0.1), &config)
        .await
        .unwrap();
    let (left, _) = rendered.stereo().unwrap();
    assert!(energy(left) > 1e-3, "fallback impulse should still render");
}

#[tokio::test]
async fn empty_source_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_assets(dir.path());

    let empty = Arc::new(AudioData::default());
    let err = engine
        .render_offline(empty, &ReverbConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, engine_core::Error::Decode(_)));
}

#[tokio::test]
async fn preset_catalog_lists_seeded_presets() {
    let dir = tempfile::tempdir().unwrap();
    seed_assets(dir.path());
    let engine = engine_with_assets(dir.path());

    let catalog = engine.impulses().catalog().await;
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].id, "room");
    assert_eq!(catalog[0].label, "Test Room");
}
