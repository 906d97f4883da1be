//! ttstudio main entry point
//!
//! Interactive mode reads lines from stdin: plain lines replace the text
//! buffer and `:` commands drive the session. The main loop wakes for
//! input, finished jobs and the auto-generation timer.
//!
//! One-shot mode (`--say`) synthesizes and exports a single file.

use anyhow::{anyhow, bail, Context};
use log::{debug, error, info};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use ttstudio::player::PreviewPlayer;
use ttstudio::service::SynthesisService;
use ttstudio::speech::synth::SynthesisConfig;
use ttstudio::state::config::Config;
use ttstudio::state::{Session, StudioEvents};

/// Longest the main loop sleeps between checks
const TICK: Duration = Duration::from_millis(100);

const HELP: &str = "\
Type text to replace the buffer, or a command:
  :voices          list voices
  :voice <n>       select voice number n
  :dir <path>      switch the voices directory
  :rate <n>        speaking rate (words per minute)
  :volume <f>      export volume, 0.0 to 2.0
  :pitch <f>       pitch factor, 0.5 to 2.0
  :generate        synthesize the buffer
  :preview         play the result at the current pitch
  :stop            stop playback
  :save <path>     export to .wav, .mp3, .ogg or .flac
  :quit            exit";

fn main() {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let debug_mode = args.iter().any(|arg| arg == "--debug" || arg == "-d");

    // Initialize logger
    if debug_mode {
        // Debug mode: write to ttstudio.log file
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("ttstudio.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open ttstudio.log for debug logging: {}", e);
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "ttstudio version {} starting (debug mode, logging to ttstudio.log)",
            ttstudio::VERSION
        );
    } else {
        // Normal mode: only errors to stderr
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Error)
            .init();
    }

    let args: Vec<String> = args
        .into_iter()
        .skip(1)
        .filter(|arg| arg != "--debug" && arg != "-d")
        .collect();

    let outcome = if args.is_empty() {
        run_interactive()
    } else {
        run_once(&args)
    };

    if let Err(e) = outcome {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Options for `--say`
#[derive(Debug, Default)]
struct OneShot {
    text: Option<String>,
    voice: Option<PathBuf>,
    out: Option<PathBuf>,
    rate: Option<u32>,
    volume: Option<f32>,
    pitch: Option<f32>,
}

fn parse_one_shot(args: &[String]) -> anyhow::Result<OneShot> {
    let mut opts = OneShot::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{} needs a value", flag))
        };
        match flag.as_str() {
            "--say" => opts.text = Some(value()?),
            "--voice" => opts.voice = Some(PathBuf::from(value()?)),
            "--out" => opts.out = Some(PathBuf::from(value()?)),
            "--rate" => opts.rate = Some(value()?.parse::<u32>().context("--rate")?),
            "--volume" => opts.volume = Some(value()?.parse::<f32>().context("--volume")?),
            "--pitch" => opts.pitch = Some(value()?.parse::<f32>().context("--pitch")?),
            "--help" | "-h" => {
                bail!("usage: ttstudio [--debug] [--say <text> --voice <model.onnx> --out <file> [--rate n] [--volume f] [--pitch f]]")
            }
            other => bail!("unknown argument: {}", other),
        }
    }
    Ok(opts)
}

/// Synthesize, post-process and export one file, then exit
fn run_once(args: &[String]) -> anyhow::Result<()> {
    let opts = parse_one_shot(args)?;
    let text = opts.text.context("--say <text> is required")?;
    let out = opts.out.context("--out <file> is required")?;

    let config = Config::load().context("loading configuration")?;
    let service = SynthesisService::from_config(&config)?;

    let voice = match opts.voice {
        Some(voice) => voice,
        None => service
            .list_voices()?
            .into_iter()
            .next()
            .map(|v| v.id)
            .context("--voice <model.onnx> is required (no voices in the configured directory)")?,
    };

    let synthesis = SynthesisConfig {
        voice_id: Some(voice),
        rate: opts.rate.unwrap_or_else(|| config.rate()),
        volume: opts.volume.unwrap_or_else(|| config.volume()),
        pitch: opts.pitch.unwrap_or_else(|| config.pitch()),
    };

    let wav = service.synthesize_to_temp(&text, &synthesis)?;
    service.export(&wav, &out, synthesis.pitch, synthesis.volume)?;
    println!("Saved: {}", out.display());
    Ok(())
}

/// Front-end side of the session callbacks
#[derive(Default)]
struct ConsoleEvents {
    /// Preview waiting to be handed to the player
    preview: Option<PathBuf>,
}

impl StudioEvents for ConsoleEvents {
    fn on_busy_changed(&mut self, busy: bool) {
        debug!("Busy: {}", busy);
    }

    fn on_status_message(&mut self, message: &str) {
        println!("{}", message);
    }

    fn on_generation_result(&mut self, ok: bool, message: &str, path: Option<&Path>) {
        match path {
            Some(path) if ok => info!("Generated {}", path.display()),
            _ => info!("Generation failed: {}", message),
        }
    }

    fn on_preview_ready(&mut self, path: &Path) {
        self.preview = Some(path.to_path_buf());
    }
}

fn spawn_stdin_reader() -> anyhow::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("ttstudio-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("stdin error: {}", e);
                        break;
                    }
                }
            }
            debug!("stdin closed");
        })?;
    Ok(rx)
}

fn run_interactive() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    let mut player = PreviewPlayer::new(&config.player_command())?;
    let service = SynthesisService::from_config(&config)?;
    let mut session = Session::new(config, service, ConsoleEvents::default())?;
    info!("Config from {:?}", session.config.path());

    println!("{} {} ready", ttstudio::APP_NAME, ttstudio::VERSION);
    println!("Voices: {}", session.service().voices_dir().display());
    println!("Type :help for commands");

    let lines = spawn_stdin_reader()?;
    let mut input_closed = false;

    loop {
        if input_closed {
            // Finish outstanding work before exiting
            if !session.is_busy() && !session.trigger().is_scheduled() && !player.is_playing() {
                break;
            }
            if !session.wait_for_job(TICK) {
                thread::sleep(session.next_wakeup().map_or(TICK, |d| d.min(TICK)));
            }
        } else {
            let timeout = session.next_wakeup().map_or(TICK, |d| d.min(TICK));
            match lines.recv_timeout(timeout) {
                Ok(line) => {
                    if !handle_line(&mut session, &mut player, &line) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => input_closed = true,
            }
        }

        session.poll();

        if let Some(path) = session.events_mut().preview.take() {
            if let Err(e) = player.play(&path) {
                println!("{}", e);
            }
        }
    }

    info!("ttstudio exiting");
    Ok(())
}

/// Apply one input line; returns false to quit
fn handle_line(
    session: &mut Session<ConsoleEvents>,
    player: &mut PreviewPlayer,
    line: &str,
) -> bool {
    let Some(command) = line.strip_prefix(':') else {
        session.set_text(line);
        return true;
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command.trim(), ""),
    };

    let result = match name {
        "quit" | "q" => return false,
        "help" => {
            println!("{}", HELP);
            Ok(())
        }
        "voices" => list_voices(session),
        "voice" => select_voice(session, arg),
        "dir" => session
            .set_voices_directory(Path::new(arg))
            .map(|voices| println!("{} voice(s) found", voices.len()))
            .map_err(anyhow::Error::from),
        "rate" => arg
            .parse::<u32>()
            .map(|rate| session.set_rate(rate))
            .context("rate must be a whole number"),
        "volume" => arg
            .parse::<f32>()
            .map(|volume| session.set_volume(volume))
            .context("volume must be a number"),
        "pitch" => arg
            .parse::<f32>()
            .context("pitch must be a number")
            .and_then(|pitch| change_pitch(session, player, pitch)),
        "generate" | "g" => session
            .generate()
            .map(|submission| debug!("{:?}", submission))
            .map_err(anyhow::Error::from),
        "preview" | "p" => session.request_preview().map_err(anyhow::Error::from),
        "stop" => {
            player.stop();
            Ok(())
        }
        "save" => session
            .request_save(Path::new(arg))
            .map_err(anyhow::Error::from),
        other => Err(anyhow!("Unknown command :{} (try :help)", other)),
    };

    if let Err(e) = result {
        println!("{:#}", e);
    }
    true
}

fn list_voices(session: &Session<ConsoleEvents>) -> anyhow::Result<()> {
    let voices = session.list_voices()?;
    if voices.is_empty() {
        println!("No .onnx files found in {}", session.service().voices_dir().display());
    }
    let selected = session.selection().voice_id.as_deref();
    for (n, voice) in voices.iter().enumerate() {
        let marker = if Some(voice.id.as_path()) == selected { '*' } else { ' ' };
        println!("{} {:>2}. {}", marker, n + 1, voice.display_name);
    }
    Ok(())
}

fn select_voice(session: &mut Session<ConsoleEvents>, arg: &str) -> anyhow::Result<()> {
    let n: usize = arg.parse().context("voice number expected")?;
    let voice = session
        .list_voices()?
        .into_iter()
        .nth(n.wrapping_sub(1))
        .with_context(|| format!("No voice number {}", n))?;
    println!("Voice: {}", voice.display_name);
    session.select_voice(Some(voice.id));
    Ok(())
}

/// A pitch change while a preview plays restarts it at the new pitch
fn change_pitch(
    session: &mut Session<ConsoleEvents>,
    player: &mut PreviewPlayer,
    pitch: f32,
) -> anyhow::Result<()> {
    session.set_pitch(pitch);
    if player.is_playing() {
        player.stop();
        session.request_preview()?;
    }
    Ok(())
}
