//! Command line parsing
//!
//! ```text
//! karaoke-player [play] <backing> [options]
//! karaoke-player render <backing> <vocal> <output.wav> [options]
//! karaoke-player devices
//! karaoke-player convert-lyrics <lyrics.txt> [output.json]
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

pub const USAGE: &str = "\
Usage:
  karaoke-player [play] <backing> [options]
  karaoke-player render <backing> <vocal> <output.wav> [options]
  karaoke-player devices
  karaoke-player convert-lyrics <lyrics.txt> [output.json]

Options:
  --config <file>     Player config (default: ~/.config/karaoke/player-config.yaml)
  --lyrics <file>     Lyrics file (default: <backing>.lyrics.json next to the track)
  --preset <name>     Vocal preset (e.g. \"Studio Recording\")
  --input <name>      Microphone device name
  --output <name>     Playback device name
  --buffer <frames>   Buffer size in frames
  --rate <hz>         Stream sample rate";

/// Options shared by `play` and `render`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    pub config: Option<PathBuf>,
    pub lyrics: Option<PathBuf>,
    pub preset: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub buffer: Option<u32>,
    pub rate: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cli {
    Play {
        backing: PathBuf,
        options: Options,
    },
    Render {
        backing: PathBuf,
        vocal: PathBuf,
        output: PathBuf,
        options: Options,
    },
    Devices,
    ConvertLyrics {
        input: PathBuf,
        output: Option<PathBuf>,
    },
    Help,
}

fn option_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().with_context(|| format!("{} needs a value", flag))
}

fn parse_number(value: String, flag: &str) -> Result<u32> {
    value
        .parse()
        .with_context(|| format!("{} expects a whole number, got '{}'", flag, value))
}

/// Split `args` (without the program name) into positionals and options
fn split(args: impl IntoIterator<Item = String>) -> Result<(Vec<String>, Options)> {
    let mut args = args.into_iter();
    let mut positionals = Vec::new();
    let mut options = Options::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => options.config = Some(option_value(&mut args, &arg)?.into()),
            "--lyrics" => options.lyrics = Some(option_value(&mut args, &arg)?.into()),
            "--preset" => options.preset = Some(option_value(&mut args, &arg)?),
            "--input" => options.input = Some(option_value(&mut args, &arg)?),
            "--output" => options.output = Some(option_value(&mut args, &arg)?),
            "--buffer" => options.buffer = Some(parse_number(option_value(&mut args, &arg)?, &arg)?),
            "--rate" => options.rate = Some(parse_number(option_value(&mut args, &arg)?, &arg)?),
            "-h" | "--help" => return Ok((vec!["help".to_string()], options)),
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            _ => positionals.push(arg.clone()),
        }
    }
    Ok((positionals, options))
}

impl Cli {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let (positionals, options) = split(args)?;
        let mut positionals = positionals.into_iter();

        let Some(first) = positionals.next() else {
            return Ok(Cli::Help);
        };
        let rest: Vec<PathBuf> = positionals.map(PathBuf::from).collect();

        let cli = match (first.as_str(), rest.as_slice()) {
            ("help", _) => Cli::Help,
            ("devices", []) => Cli::Devices,
            ("play", [backing]) => Cli::Play {
                backing: backing.clone(),
                options,
            },
            ("render", [backing, vocal, output]) => Cli::Render {
                backing: backing.clone(),
                vocal: vocal.clone(),
                output: output.clone(),
                options,
            },
            ("convert-lyrics", [input]) => Cli::ConvertLyrics {
                input: input.clone(),
                output: None,
            },
            ("convert-lyrics", [input, output]) => Cli::ConvertLyrics {
                input: input.clone(),
                output: Some(output.clone()),
            },
            ("devices" | "play" | "render" | "convert-lyrics", _) => {
                bail!("Wrong number of arguments for '{}'", first)
            }
            (_, []) => Cli::Play {
                backing: PathBuf::from(&first),
                options,
            },
            _ => bail!("Unknown command: {}", first),
        };
        Ok(cli)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli> {
        Cli::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_bare_path_plays() {
        let cli = parse(&["song.wav", "--preset", "Podcast", "--buffer", "256"]).unwrap();
        assert_eq!(
            cli,
            Cli::Play {
                backing: PathBuf::from("song.wav"),
                options: Options {
                    preset: Some("Podcast".to_string()),
                    buffer: Some(256),
                    ..Default::default()
                },
            }
        );
    }

    #[test]
    fn test_render_needs_three_paths() {
        let cli = parse(&["render", "b.wav", "v.wav", "out.wav", "--rate", "44100"]).unwrap();
        match cli {
            Cli::Render { output, options, .. } => {
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(options.rate, Some(44100));
            }
            other => panic!("expected render, got {:?}", other),
        }
        assert!(parse(&["render", "b.wav"]).is_err());
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(parse(&[]).unwrap(), Cli::Help);
        assert_eq!(parse(&["--help"]).unwrap(), Cli::Help);
        assert_eq!(parse(&["devices"]).unwrap(), Cli::Devices);
        assert_eq!(
            parse(&["convert-lyrics", "a_lyrics.txt"]).unwrap(),
            Cli::ConvertLyrics {
                input: PathBuf::from("a_lyrics.txt"),
                output: None
            }
        );
    }

    #[test]
    fn test_bad_options() {
        assert!(parse(&["song.wav", "--buffer"]).is_err());
        assert!(parse(&["song.wav", "--buffer", "many"]).is_err());
        assert!(parse(&["song.wav", "--loud"]).is_err());
        assert!(parse(&["a.wav", "b.wav"]).is_err());
    }
}
