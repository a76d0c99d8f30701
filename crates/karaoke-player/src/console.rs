//! Interactive commands typed while a track plays
//!
//! Lines are read on a dedicated thread and handed to the UI loop over a
//! crossbeam channel so the loop never blocks on stdin.

use std::io::BufRead;

use anyhow::{bail, Context, Result};
use crossbeam::channel::{unbounded, Receiver};

use karaoke_core::effect::ParamId;
use karaoke_core::presets::Preset;

pub const HELP: &str = "\
Commands:
  <enter> | space     toggle play/pause
  play | pause | stop
  seek <seconds>      jump to a position
  + [seconds] | - [seconds]
                      skip forward / back
  vol <0-2>           vocal volume
  set <param> <value> e.g. 'set reverb_wet 0.4'
  preset <name>       e.g. 'preset rock vocal'
  params              show effect settings
  presets             list presets
  save                store current settings in the config file
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Toggle,
    Play,
    Pause,
    Stop,
    Seek(f64),
    /// Relative move in seconds; `None` uses the configured skip
    Skip { forward: bool, seconds: Option<f64> },
    Volume(f32),
    Set(ParamId, f32),
    Preset(Preset),
    Params,
    Presets,
    Save,
    Help,
    Quit,
}

fn number<T: std::str::FromStr>(value: Option<&str>, what: &str) -> Result<T> {
    let value = value.with_context(|| format!("{} needs a value", what))?;
    value
        .parse()
        .ok()
        .with_context(|| format!("'{}' is not a valid {}", value, what))
}

/// Parse one input line
pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();

    let command = match word.to_ascii_lowercase().as_str() {
        "" | "space" | "toggle" | "p" => Command::Toggle,
        "play" => Command::Play,
        "pause" => Command::Pause,
        "stop" => Command::Stop,
        "seek" => Command::Seek(number(args.next(), "position")?),
        "+" | "-" | "ff" | "rw" => Command::Skip {
            forward: matches!(word, "+" | "ff"),
            seconds: match args.next() {
                Some(s) => Some(number(Some(s), "skip")?),
                None => None,
            },
        },
        "vol" | "volume" => Command::Volume(number(args.next(), "volume")?),
        "set" => {
            let name = args.next().context("set needs a parameter name")?;
            let id: ParamId = name.parse()?;
            Command::Set(id, number(args.next(), id.name())?)
        }
        "preset" => {
            if rest.is_empty() {
                bail!("preset needs a name");
            }
            Command::Preset(rest.parse()?)
        }
        "params" => Command::Params,
        "presets" => Command::Presets,
        "save" => Command::Save,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => bail!("Unknown command '{}' (type 'help')", other),
    };
    Ok(command)
}

/// Spawn the stdin reader; the channel disconnects at end of input
pub fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            log::debug!("stdin reader finished");
        })
        .context("Failed to spawn stdin reader thread")?;
    Ok(rx)
}
