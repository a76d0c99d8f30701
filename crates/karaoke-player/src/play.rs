//! Live karaoke playback in the terminal
//!
//! Shows a status line (position, vocal levels, clip and fallback
//! indicators) and the current lyric while reading commands from stdin.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossbeam::channel::{never, tick};

use karaoke_core::audio::KaraokeSession;
use karaoke_core::config::save_config;
use karaoke_core::effect::{EffectParameters, ParamId, PublishError};
use karaoke_core::level::LevelReading;
use karaoke_core::lyrics::Lyrics;
use karaoke_core::presets::Preset;
use karaoke_core::track::decode_file;
use karaoke_core::types::PlayState;

use crate::config::PlayerConfig;
use crate::console::{parse_command, spawn_stdin_reader, Command, HELP};

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Ten-step bar for a dB value in [-60, 0]
fn meter_bar(db: f32) -> String {
    let filled = (((db + 60.0) / 6.0).round().clamp(0.0, 10.0)) as usize;
    format!("{}{}", "#".repeat(filled), "-".repeat(10 - filled))
}

fn status_line(session: &KaraokeSession, levels: &LevelReading, clipped: bool) -> String {
    let transport = session.transport();
    let state = match transport.state() {
        PlayState::Playing => ">",
        PlayState::Paused => "||",
        PlayState::Stopped => "[]",
    };
    let mut line = format!(
        "{:>2} {} / {}  L [{}] {:>5.1} dB  R [{}] {:>5.1} dB  vol {:.2}",
        state,
        format_time(transport.position_seconds()),
        format_time(transport.duration_seconds()),
        meter_bar(levels.left_db),
        levels.left_peak_db,
        meter_bar(levels.right_db),
        levels.right_peak_db,
        session.volume(),
    );
    if clipped {
        line.push_str("  CLIP");
    }
    let fallbacks = session.atomics().fallback_blocks();
    if fallbacks > 0 {
        line.push_str(&format!("  dry x{}", fallbacks));
    }
    line
}

fn print_params(params: &EffectParameters) {
    println!();
    for (id, value) in params.iter() {
        let info = id.info();
        println!(
            "  {:<22} {:>7.2}{:<3} ({} .. {})",
            id.name(),
            value,
            info.unit,
            info.min,
            info.max
        );
    }
}

fn load_lyrics(backing: &Path, explicit: Option<&Path>) -> Option<Lyrics> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Lyrics::find_sidecar(backing)?,
    };
    match Lyrics::load(&path) {
        Ok(lyrics) => Some(lyrics),
        Err(e) => {
            log::warn!("Lyrics unavailable: {}", e);
            None
        }
    }
}

/// Whether the live loop should end once the backing track is done
///
/// With stdin closed nothing can restart playback, so a finished track
/// always ends the session.
fn should_exit(finished: bool, stdin_open: bool, auto_stop: bool) -> bool {
    finished && (auto_stop || !stdin_open)
}

/// Effect parameters the engine runs with, plus the latest edit still
/// waiting for room in the chain queue
#[derive(Debug, Clone, Copy)]
struct EffectEdits {
    applied: EffectParameters,
    pending: Option<EffectParameters>,
}

impl EffectEdits {
    fn new(applied: EffectParameters) -> Self {
        Self { applied, pending: None }
    }

    /// The parameters the user last asked for
    fn wanted(&self) -> EffectParameters {
        self.pending.unwrap_or(self.applied)
    }

    /// Publish `params`; a full queue keeps them pending for [`Self::retry`]
    fn offer<F>(&mut self, params: EffectParameters, publish: F) -> Result<(), PublishError>
    where
        F: FnOnce(&EffectParameters) -> Result<(), PublishError>,
    {
        match publish(&params) {
            Ok(()) => {
                self.applied = params;
                self.pending = None;
                Ok(())
            }
            Err(e) => {
                self.pending = Some(params);
                Err(e)
            }
        }
    }

    /// Publish the pending edit, if any. Returns `true` once it is applied.
    fn retry<F>(&mut self, publish: F) -> bool
    where
        F: FnOnce(&EffectParameters) -> Result<(), PublishError>,
    {
        match self.pending {
            Some(params) => self.offer(params, publish).is_ok(),
            None => false,
        }
    }
}

/// The running session plus the settings the user is editing
struct Player<'a> {
    session: KaraokeSession,
    effects: EffectEdits,
    config: &'a mut PlayerConfig,
    config_path: PathBuf,
}

impl Player<'_> {
    fn publish(&mut self, params: EffectParameters) {
        let session = &mut self.session;
        if let Err(e) = self.effects.offer(params, |p| session.publish_params(p)) {
            log::warn!("Effect change deferred: {}", e);
        }
    }

    fn retry_pending(&mut self) {
        let session = &mut self.session;
        if self.effects.retry(|p| session.publish_params(p)) {
            log::info!("Deferred effect change applied");
        }
    }

    /// Returns `false` when the user asked to quit
    fn handle(&mut self, command: Command) -> bool {
        let transport = self.session.transport().clone();
        match command {
            Command::Toggle => {
                if transport.state() == PlayState::Stopped {
                    self.handle(Command::Play);
                } else {
                    transport.toggle_play_pause();
                }
            }
            Command::Play => {
                if self.session.is_finished() {
                    transport.seek(0);
                }
                transport.play();
            }
            Command::Pause => transport.pause(),
            Command::Stop => {
                transport.stop();
                transport.seek(0);
            }
            Command::Seek(seconds) => {
                transport.seek_seconds(seconds);
            }
            Command::Skip { forward, seconds } => {
                let seconds = seconds.unwrap_or(self.config.skip_seconds);
                if forward {
                    transport.skip_forward(seconds);
                } else {
                    transport.skip_backward(seconds);
                }
            }
            Command::Volume(volume) => {
                let applied = self.session.set_volume(volume);
                println!("\nvolume {:.2}", applied);
            }
            Command::Set(id, value) => {
                let mut params = self.effects.wanted();
                let applied = params.set(id, value);
                self.publish(params);
                println!("\n{} = {:.2}", id, applied);
            }
            Command::Preset(preset) => {
                let mut params = self.effects.wanted();
                let volume = preset.apply(&mut params);
                self.publish(params);
                self.session.set_volume(volume);
                self.config.preset = Some(preset.name().to_string());
                println!(
                    "\n{}: reverb {:.2}, echo {:.2}, volume {:.2}",
                    preset,
                    params.get(ParamId::ReverbWet),
                    params.get(ParamId::EchoMix),
                    volume
                );
            }
            Command::Params => print_params(&self.effects.wanted()),
            Command::Presets => {
                println!();
                for preset in Preset::ALL {
                    println!("  {}", preset);
                }
            }
            Command::Save => {
                self.config.effects = self.effects.wanted();
                self.config.volume = self.session.volume();
                // The saved effects already include the preset
                self.config.preset = None;
                match save_config(&*self.config, &self.config_path) {
                    Ok(()) => println!("\nSaved to {:?}", self.config_path),
                    Err(e) => log::error!("{:#}", e),
                }
            }
            Command::Help => println!("\n{}", HELP),
            Command::Quit => return false,
        }
        true
    }
}

/// Play `backing` with the live microphone until the user quits
///
/// The loop also ends when the track finishes and either stdin is closed
/// or `auto_stop` is set.
pub fn run(
    backing: &Path,
    lyrics_path: Option<&Path>,
    config: &mut PlayerConfig,
    config_path: PathBuf,
) -> Result<()> {
    let track = decode_file(backing).with_context(|| format!("Failed to load backing track {:?}", backing))?;
    let lyrics = load_lyrics(backing, lyrics_path);
    let (params, volume) = config.initial_mix();

    let session = KaraokeSession::start(track, &config.audio, &params, volume)
        .context("Failed to start audio session")?;
    println!(
        "Mic: {}  ->  Out: {}  ({} Hz)",
        session.input_device_name(),
        session.output_device_name(),
        session.sample_rate()
    );
    println!("{}", HELP);

    let mut player = Player {
        session,
        effects: EffectEdits::new(params),
        config,
        config_path,
    };

    let lines = spawn_stdin_reader()?;
    let closed = never();
    let mut stdin_open = true;
    let ticker = tick(player.config.refresh_interval());
    let mut shown_lyric: Option<usize> = None;
    let mut announced_end = false;
    let mut clip_hold = 0u32;

    loop {
        let input = if stdin_open { &lines } else { &closed };
        crossbeam::select! {
            recv(input) -> line => match line {
                Ok(line) => match parse_command(&line) {
                    Ok(command) => {
                        if !player.handle(command) {
                            break;
                        }
                    }
                    Err(e) => println!("\n{}", e),
                },
                Err(_) => {
                    log::info!("Input closed; exiting at the end of the track");
                    stdin_open = false;
                }
            },
            recv(ticker) -> _ => {
                if player.session.stream_failed() {
                    anyhow::bail!("Audio stream failed");
                }

                player.retry_pending();

                let levels = player.session.poll_levels();
                if player.session.atomics().take_clipped() {
                    clip_hold = player.config.refresh_hz;
                } else {
                    clip_hold = clip_hold.saturating_sub(1);
                }

                if let Some(lyrics) = &lyrics {
                    let seconds = player.session.transport().position_seconds();
                    let active = lyrics.active_index(seconds);
                    if active != shown_lyric {
                        if let Some(current) = lyrics.window_at(seconds).current {
                            println!("\r\x1b[2K  ♪ {}", current.text);
                        }
                        shown_lyric = active;
                    }
                }

                print!("\r\x1b[2K{}", status_line(&player.session, &levels, clip_hold > 0));
                let _ = std::io::stdout().flush();

                let finished = player.session.is_finished();
                if should_exit(finished, stdin_open, player.config.auto_stop) {
                    println!("\nEnd of track");
                    break;
                }
                if finished && !announced_end {
                    announced_end = true;
                    println!("\nEnd of track (type 'play' to start over, 'quit' to exit)");
                } else if !finished {
                    announced_end = false;
                }
            }
        }
    }

    println!();
    player.session.stop();
    Ok(())
}
