//! Karaoke Player - sing over a backing track with live vocal effects
//!
//! Entry point for the terminal player. It:
//! 1. Loads the player config (devices, effects, volume)
//! 2. Opens a duplex audio session for the microphone and speakers
//! 3. Runs the status/command loop until the user quits
//!
//! Run without arguments for usage. Set RUST_LOG=debug for verbose output.

mod args;
mod config;
mod console;
mod play;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};

use karaoke_core::audio::{
    get_input_devices, get_output_devices, AudioDevice, AudioResult, BufferSize, DeviceId,
};
use karaoke_core::config::{load_config, try_load_config};
use karaoke_core::lyrics::convert_text_file;
use karaoke_core::presets::Preset;

use args::{Cli, Options, USAGE};
use config::PlayerConfig;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse(std::env::args().skip(1))?;

    match cli {
        Cli::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        Cli::Devices => {
            print_devices("Input", get_input_devices());
            print_devices("Output", get_output_devices());
            Ok(())
        }
        Cli::ConvertLyrics { input, output } => {
            let written = convert_text_file(&input, output.as_deref())
                .with_context(|| format!("Failed to convert {:?}", input))?;
            println!("Wrote {:?}", written);
            Ok(())
        }
        Cli::Play { backing, options } => {
            let (mut config, config_path) = load_player_config(&options)?;
            log::info!("karaoke-player starting up");
            play::run(&backing, options.lyrics.as_deref(), &mut config, config_path)
        }
        Cli::Render {
            backing,
            vocal,
            output,
            options,
        } => {
            let (config, _) = load_player_config(&options)?;
            let (params, volume) = config.initial_mix();
            let stats = render::render_file(
                &backing,
                &vocal,
                &output,
                config.audio.sample_rate,
                config.audio.max_track_rate,
                &params,
                volume,
            )?;
            println!(
                "Rendered {} frames at {} Hz to {:?}",
                stats.frames, stats.sample_rate, output
            );
            Ok(())
        }
    }
}

fn print_devices(label: &str, devices: AudioResult<Vec<AudioDevice>>) {
    println!("{} devices:", label);
    match devices {
        Ok(devices) => {
            for device in devices {
                println!(
                    "  {}  ({} ch, {:?} Hz)",
                    device, device.max_channels, device.sample_rates
                );
            }
        }
        Err(e) => println!("  {}", e),
    }
}

/// Load the config file and apply command line overrides
///
/// A config named with `--config` must load; the default location falls
/// back to defaults.
fn load_player_config(options: &Options) -> Result<(PlayerConfig, PathBuf)> {
    let (mut config, path) = match &options.config {
        Some(path) => (try_load_config::<PlayerConfig>(path)?, path.clone()),
        None => {
            let path = config::default_config_path();
            (load_config::<PlayerConfig>(&path), path)
        }
    };
    apply_overrides(&mut config, options)?;
    Ok((config, path))
}

fn apply_overrides(config: &mut PlayerConfig, options: &Options) -> Result<()> {
    if let Some(name) = &options.preset {
        let preset: Preset = name.parse()?;
        config.preset = Some(preset.name().to_string());
    }
    if let Some(name) = &options.input {
        config.audio.input_device = Some(DeviceId::new(name.as_str()));
    }
    if let Some(name) = &options.output {
        config.audio.output_device = Some(DeviceId::new(name.as_str()));
    }
    if let Some(frames) = options.buffer {
        config.audio.buffer_size = BufferSize::Fixed(frames);
    }
    if let Some(rate) = options.rate {
        config.audio.sample_rate = Some(rate);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = PlayerConfig::default();
        let options = Options {
            preset: Some("podcast".to_string()),
            input: Some("USB Mic".to_string()),
            buffer: Some(256),
            rate: Some(44100),
            ..Default::default()
        };
        apply_overrides(&mut config, &options).unwrap();

        assert_eq!(config.preset.as_deref(), Some("Podcast"));
        assert_eq!(config.audio.input_device, Some(DeviceId::new("USB Mic")));
        assert_eq!(config.audio.buffer_size.as_frames(), Some(256));
        assert_eq!(config.audio.sample_rate, Some(44100));
    }

    #[test]
    fn test_unknown_preset_override_fails() {
        let options = Options {
            preset: Some("opera".to_string()),
            ..Default::default()
        };
        assert!(apply_overrides(&mut PlayerConfig::default(), &options).is_err());
    }

    #[test]
    fn test_explicit_config_must_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "volume: [").unwrap();
        let options = Options {
            config: Some(path),
            ..Default::default()
        };
        assert!(load_player_config(&options).is_err());
    }
}
