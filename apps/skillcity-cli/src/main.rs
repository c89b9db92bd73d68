use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use skillcity_assets::{FsLoader, ResourceCache};
use skillcity_input::{Action, Control, InputSource, InputState, ScriptedInput};
use skillcity_kernel::CityBuilder;
use skillcity_render::{DebugTextRenderer, Renderer};
use skillcity_session::{CameraMode, CitySession, InfoEvent, RecordingSink, SessionConfig};
use skillcity_tools::CityInspector;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skillcity-cli", about = "Headless tools for the skill city scene")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Session config (YAML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and a summary of the default city
    Info,
    /// Assemble a city and report what was placed
    Generate {
        /// Override the layout seed
        #[arg(short, long)]
        seed: Option<u64>,
        /// List every entity in traversal order
        #[arg(short, long)]
        list: bool,
        /// Print the effective config as YAML and exit
        #[arg(long)]
        dump_config: bool,
    },
    /// Run frames against a headless session
    Simulate {
        /// Number of frames to run
        #[arg(short, long, default_value = "120")]
        frames: u64,
        /// Seconds per frame
        #[arg(long, default_value = "0.016")]
        dt: f32,
        /// Camera mode to run in
        #[arg(short, long, value_enum, default_value = "character")]
        mode: ModeArg,
        /// Hold forward for this many frames
        #[arg(short, long, default_value = "60")]
        walk: u64,
        /// Print a debug frame every N frames (0 = never)
        #[arg(long, default_value = "0")]
        every: u64,
    },
    /// Click a window pixel after the first frame and report the info calls
    Pick {
        x: f32,
        y: f32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Orbit,
    Character,
}

impl From<ModeArg> for CameraMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Orbit => CameraMode::Orbit,
            ModeArg::Character => CameraMode::Character,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

fn start_session(config: SessionConfig) -> anyhow::Result<CitySession> {
    let loader = FsLoader::blocking(config.asset_root.clone());
    tracing::debug!(root = %loader.root().display(), "loading assets");
    Ok(CitySession::new(config, Box::new(loader))?)
}

fn print_events(sink: &RecordingSink) {
    for event in &sink.events {
        match event {
            InfoEvent::Show(id, info) => println!("showInfo({id}): {} - {}", info.title, info.description),
            InfoEvent::Hide => println!("hideInfo()"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Info => {
            println!("skillcity-cli v{}", env!("CARGO_PKG_VERSION"));
            let city = CityBuilder::new(config.city).build(ResourceCache::new())?;
            print!("{}", CityInspector::summary(&city, None));
        }
        Commands::Generate {
            seed,
            list,
            dump_config,
        } => {
            let mut city_config = config.city;
            if let Some(seed) = seed {
                city_config.seed = seed;
            }
            if dump_config {
                print!("{}", city_config.to_yaml_string()?);
                return Ok(());
            }
            let city = CityBuilder::new(city_config).build(ResourceCache::new())?;
            print!("{}", CityInspector::summary(&city, None));
            if list {
                for id in CityInspector::list_entities(&city) {
                    if let Some(entity) = CityInspector::inspect_entity(&city, id) {
                        println!("  {entity}");
                    }
                }
            }
        }
        Commands::Simulate {
            frames,
            dt,
            mode,
            walk,
            every,
        } => {
            let (width, height) = config.viewport;
            let mut session = start_session(config)?;
            session.set_mode(mode.into());

            let mut script = vec![(0, Action::Press(Control::Forward))];
            script.push((walk, Action::Release(Control::Forward)));
            // Pulse interact once the walk is over.
            script.push((walk + 1, Action::Interact));
            let mut source = ScriptedInput::new(script);

            let mut input = InputState::new();
            let mut sink = RecordingSink::new();
            let mut renderer = DebugTextRenderer::new();
            renderer.on_resize(width, height);
            let mut last = None;

            for frame in 0..frames {
                for action in source.poll() {
                    session.handle_action(&action, &mut input, &mut sink);
                }
                last = Some(session.frame(dt, &mut input, &mut sink));
                if every > 0 && frame % every == 0 {
                    print!("{}", renderer.render_frame(&session.draw_list(), session.camera())?);
                }
            }

            let position = session.player().position();
            println!(
                "Player: pos=({:.2}, {:.2}, {:.2}) state={:?} minimap=({:.2}, {:.2})",
                position.x,
                position.y,
                position.z,
                session.player().state(),
                session.minimap_position().x,
                session.minimap_position().y,
            );
            print_events(&sink);
            print!("{}", CityInspector::summary(session.city(), last));
            session.dispose();
        }
        Commands::Pick { x, y } => {
            let mut session = start_session(config)?;
            let mut input = InputState::new();
            let mut sink = RecordingSink::new();
            session.frame(0.0, &mut input, &mut sink);
            match session.click(x, y, &mut sink) {
                Some(id) => {
                    if let Some(entity) = CityInspector::inspect_entity(session.city(), id) {
                        println!("{entity}");
                    }
                }
                None => match session.ground_point(x, y) {
                    Some(p) => println!("No entity; ground at ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z),
                    None => println!("No entity"),
                },
            }
            print_events(&sink);
        }
    }

    Ok(())
}
