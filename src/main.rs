use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use engine_core::scene::ReverbConfig;
use engine_core::Error;

use settings::ConfigManager;
use soundfield::{Engine, SceneDelta};

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  soundfield play <audio-file> [preset]");
    eprintln!("  soundfield render <audio-file> <out.wav> [preset]");
    eprintln!("  soundfield presets");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let config_manager = ConfigManager::new()?;
    let engine = Engine::new(config_manager.settings().clone());

    match args[1].as_str() {
        "play" => {
            if args.len() < 3 {
                usage();
            }
            let data = Arc::new(audio_io::decode_file(&args[2])?);
            let config = ReverbConfig {
                preset_id: args.get(3).cloned(),
                ..ReverbConfig::default()
            };

            let session = engine.start_session(data, &config).await?;
            engine.set_looping(&session, true)?;
            engine.update_scene(
                &session,
                SceneDelta {
                    preview: Some(true),
                    ..SceneDelta::default()
                },
            )?;

            println!("Playing {} (session {}); Ctrl-C to stop.", args[2], session.id);
            tokio::signal::ctrl_c().await?;
            engine.teardown(session);
        }
        "render" => {
            if args.len() < 4 {
                usage();
            }
            let data = Arc::new(audio_io::decode_file(&args[2])?);
            let config = ReverbConfig {
                preset_id: args.get(4).cloned(),
                ..ReverbConfig::default()
            };

            let rendered = engine.render_offline(data, &config).await?;
            let (left, right) = rendered
                .stereo()
                .ok_or_else(|| Error::Audio("offline render produced no audio".to_string()))?;
            let wav = audio_io::encode_stereo_pcm16(left, right, rendered.sample_rate);
            fs::write(&args[3], wav)?;
            println!(
                "Rendered {} ({:.2} s) to {}",
                args[2],
                rendered.duration_secs(),
                args[3]
            );
        }
        "presets" => {
            let catalog = engine.impulses().catalog().await;
            if catalog.is_empty() {
                println!("No presets available (manifest missing or empty).");
            }
            for preset in catalog {
                println!("{:<16} {} ({:.1} s)", preset.id, preset.label, preset.decay_seconds);
            }
        }
        _ => usage(),
    }

    // Give the logger a moment to flush background warnings.
    tokio::time::sleep(Duration::from_millis(10)).await;
    Ok(())
}
