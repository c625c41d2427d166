use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::Path;
use std::sync::mpsc;

use anyhow::{Result, anyhow};
use clap::Parser;
use subtitle_bars::session::{self, DecodeCompletion, UploadOutcome};
use subtitle_bars::{FontWeight, Session, StyleControls};

#[derive(Parser, Debug)]
#[command(
    name = "subtitle-bars",
    version,
    about = "Stack outlined subtitle bars beneath an image"
)]
struct Cli {
    /// Image to place the subtitles under
    #[arg(short = 'i', long = "image")]
    image: Option<String>,

    /// Subtitle text, one bar per line (default: read from stdin)
    #[arg(short = 't', long = "text")]
    text: Option<String>,

    /// Bar height in pixels
    #[arg(long = "bar-height")]
    bar_height: Option<String>,

    /// Font size in pixels
    #[arg(long = "font-size")]
    font_size: Option<String>,

    /// Text fill color (#rrggbb)
    #[arg(long = "font-color")]
    font_color: Option<String>,

    /// Text outline color (#rrggbb)
    #[arg(long = "outline-color")]
    outline_color: Option<String>,

    /// Font family list (e.g. "Arial, sans-serif")
    #[arg(long = "font-family")]
    font_family: Option<String>,

    /// Font weight (normal, bold, lighter, bolder, 100..900)
    #[arg(long = "font-weight")]
    font_weight: Option<String>,

    /// Extra font file used when the requested family is missing
    #[arg(long = "font-path")]
    font_path: Option<String>,

    /// Output PNG path (default from settings: subtitle-image.png)
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Print the computed layout as JSON instead of saving
    #[arg(long = "layout-json")]
    layout_json: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Log layout, font and render detail to stderr
    #[arg(long = "verbose")]
    verbose: bool,

    /// Interactive mode
    #[arg(short = 'I', long = "interactive")]
    interactive: bool,
}

impl Cli {
    fn config(&self) -> subtitle_bars::Config {
        subtitle_bars::Config {
            image: self.image.clone(),
            output: self.output.clone(),
            bar_height: self.bar_height.clone(),
            font_size: self.font_size.clone(),
            font_color: self.font_color.clone(),
            outline_color: self.outline_color.clone(),
            font_family: self.font_family.clone(),
            font_weight: self.font_weight.clone(),
            font_path: self.font_path.clone(),
            settings_path: self.read_settings.clone(),
            layout_json: self.layout_json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    subtitle_bars::logging::init(cli.verbose)?;
    if cli.interactive {
        return run_interactive(&cli);
    }

    let text = match cli.text.clone() {
        Some(text) => text,
        None if io::stdin().is_terminal() => String::new(),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|err| anyhow!("stdin must be UTF-8 text ({})", err))?;
            buffer
        }
    };

    let output = subtitle_bars::run(cli.config(), &text)?;
    println!("{}", output);
    Ok(())
}

struct InteractiveState {
    session: Session,
    output: String,
    pending: mpsc::Receiver<DecodeCompletion>,
    sender: mpsc::Sender<DecodeCompletion>,
}

impl InteractiveState {
    fn drain_completions(&mut self) -> Result<()> {
        while let Ok(completion) = self.pending.try_recv() {
            match self.session.apply_completion(completion)? {
                UploadOutcome::Applied => {
                    let layout = self.session.layout();
                    println!(
                        "image loaded; preview {}x{}",
                        layout.surface_width, layout.surface_height
                    );
                }
                UploadOutcome::Failed => eprintln!("image could not be decoded"),
                UploadOutcome::Stale => {}
            }
        }
        Ok(())
    }

    fn update_control(&mut self, update: impl FnOnce(&mut StyleControls)) -> Result<()> {
        let mut controls = StyleControls::from_style(self.session.style());
        update(&mut controls);
        self.session.set_style(controls.to_style())
    }
}

fn run_interactive(cli: &Cli) -> Result<()> {
    let config = cli.config();
    let settings = subtitle_bars::load_settings(&config)?;
    let mut session = subtitle_bars::build_session(&config, &settings)?;
    session.subscribe(|summary| {
        println!(
            "preview {}x{} ({} bars{})",
            summary.width,
            summary.height,
            summary.bar_count,
            if summary.has_image { "" } else { ", no image" }
        );
    });
    if let Some(text) = cli.text.as_deref() {
        session.set_text(text)?;
    }

    let (sender, pending) = mpsc::channel();
    let mut state = InteractiveState {
        session,
        output: cli
            .output
            .clone()
            .unwrap_or_else(|| settings.export_file_name.clone()),
        pending,
        sender,
    };
    if let Some(path) = cli.image.as_deref() {
        start_upload(&mut state, path)?;
    }

    println!("Interactive mode. Use /quit or /exit to finish.");
    println!("Type /help to see available commands.");

    let mut line = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();
    loop {
        state.drain_completions()?;
        line.clear();
        print!("> ");
        io::stdout().flush()?;
        if stdin_lock.read_line(&mut line)? == 0 {
            break;
        }
        state.drain_completions()?;
        let input = line.trim_end_matches(['\r', '\n']);
        if input.trim().is_empty() {
            continue;
        }
        if input.starts_with('/') {
            match handle_interactive_command(input.trim(), &mut state) {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => eprintln!("error: {:#}", err),
            }
            continue;
        }
        state.session.push_line(input)?;
    }
    Ok(())
}

fn start_upload(state: &mut InteractiveState, path: &str) -> Result<()> {
    let bytes = std::fs::read(Path::new(path))
        .map_err(|err| anyhow!("failed to read image {}: {}", path, err))?;
    let token = state.session.begin_upload();
    session::spawn_decode(token, bytes, state.sender.clone());
    println!("decoding {}", path);
    Ok(())
}

/// Splits `/name rest` into the command name and its trimmed argument.
fn split_command(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (input, ""),
    }
}

fn handle_interactive_command(input: &str, state: &mut InteractiveState) -> Result<bool> {
    let (name, arg) = split_command(input);
    match name {
        "/quit" | "/exit" => return Ok(true),
        "/help" => print_interactive_help(),
        "/clear" => state.session.set_text("")?,
        "/lines" => {
            for bar in &state.session.layout().bars {
                println!("{:>3} y={:<5} {}", bar.index, bar.y, bar.text);
            }
        }
        "/save" => {
            let path = if arg.is_empty() {
                state.output.clone()
            } else {
                arg.to_string()
            };
            match subtitle_bars::export::save(
                state.session.surface(),
                state.session.image(),
                Path::new(&path),
            ) {
                Ok(written) => println!("saved {} ({} bytes)", path, written),
                Err(err) => eprintln!("{}", err),
            }
        }
        "/image" => {
            if arg.is_empty() {
                return Err(anyhow!("usage: /image <path>"));
            }
            start_upload(state, arg)?;
        }
        "/bar-height" => {
            let value = arg.to_string();
            state.update_control(|controls| controls.subtitle_height = value)?;
        }
        "/font-size" => {
            let value = arg.to_string();
            state.update_control(|controls| controls.font_size = value)?;
        }
        "/font-color" => {
            let value = arg.to_string();
            state.update_control(|controls| controls.font_color = value)?;
        }
        "/outline-color" => {
            let value = arg.to_string();
            state.update_control(|controls| controls.outline_color = value)?;
        }
        "/font-family" => {
            let value = arg.to_string();
            state.update_control(|controls| controls.font_family = value)?;
        }
        "/font-weight" => {
            if FontWeight::parse(arg).as_str() != arg {
                eprintln!("unknown weight '{}', using normal", arg);
            }
            let value = arg.to_string();
            state.update_control(|controls| controls.font_weight = value)?;
        }
        _ => eprintln!("unknown command: {}", input),
    }
    Ok(false)
}

fn print_interactive_help() {
    println!("Commands:");
    println!("  /quit, /exit                 Exit interactive mode");
    println!("  /image <path>                Load an image (latest upload wins)");
    println!("  /clear                       Remove all subtitle lines");
    println!("  /lines                       Show the current bars");
    println!("  /bar-height <px>             Set bar height");
    println!("  /font-size <px>              Set font size");
    println!("  /font-color <hex>            Set text fill color");
    println!("  /outline-color <hex>         Set text outline color");
    println!("  /font-family <name>          Set font family");
    println!("  /font-weight <weight>        Set font weight");
    println!("  /save [path]                 Save the preview as PNG");
    println!("  Any other line is added as a subtitle line.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use subtitle_bars::{FontLibrary, StyleConfig};

    fn state() -> InteractiveState {
        let session = Session::new(StyleConfig::default(), FontLibrary::empty()).expect("session");
        let (sender, pending) = mpsc::channel();
        InteractiveState {
            session,
            output: "unused.png".to_string(),
            pending,
            sender,
        }
    }

    #[test]
    fn commands_split_on_first_whitespace() {
        assert_eq!(split_command("/font-size 40"), ("/font-size", "40"));
        assert_eq!(split_command("/font-family  Noto Sans "), ("/font-family", "Noto Sans"));
        assert_eq!(split_command("/lines"), ("/lines", ""));
        assert_eq!(split_command("/font-sizefoo"), ("/font-sizefoo", ""));
    }

    #[test]
    fn glued_arguments_are_unknown_commands() {
        let mut state = state();
        let before = state.session.style().clone();
        for input in ["/font-sizefoo", "/font-size40", "/imagex", "/savefile.png", "/quitnow"] {
            assert!(!handle_interactive_command(input, &mut state).expect("handled"));
        }
        assert_eq!(state.session.style(), &before);
    }

    #[test]
    fn exact_commands_update_the_session() {
        let mut state = state();
        assert!(!handle_interactive_command("/font-size 40", &mut state).expect("size"));
        assert_eq!(state.session.style().font_size_px, 40);
        assert!(!handle_interactive_command("/bar-height 0", &mut state).expect("height"));
        assert_eq!(state.session.style().bar_height, 1);
        assert!(handle_interactive_command("/image", &mut state).is_err());
        assert!(handle_interactive_command("/quit", &mut state).expect("quit"));
    }
}
