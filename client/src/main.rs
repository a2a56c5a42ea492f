use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use common::config::{WEEKDAY_KEYS, parse_weekday, weekday_key, weekday_name};
use common::media::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use common::{
    Applier, ChangeOutcome, ConfigStore, MediaItem, RotationEngine, RotationMode, SystemDesktop,
    WeekdayPlaylist, is_supported, list_media,
};

#[derive(Parser)]
#[command(name = "rwctl")]
#[command(about = "Rotawall wallpaper rotation control", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "ROTAWALL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an image or video to the rotation list
    Add {
        /// Path to the media file
        file: PathBuf,
    },

    /// Remove a file from the rotation list
    Remove {
        /// Path as added, relative paths are resolved
        file: PathBuf,
    },

    /// Remove every file from the rotation list
    Clear,

    /// Show the active rotation source
    List,

    /// Switch the rotation strategy
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },

    /// Set the time-mode interval
    Interval {
        /// Minutes between changes
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        minutes: u64,
    },

    /// Rotate through every supported file in a folder
    Folder {
        /// Folder to read media from (not recursive)
        dir: PathBuf,
    },

    /// Rotate through the manual list again
    Manual,

    /// Assign media to one day of the week
    Day {
        /// Day as 0-6 (Monday = 0) or an English day name
        #[arg(value_parser = parse_day)]
        day: String,

        /// Use every supported file in this folder
        #[arg(short, long, conflicts_with = "files")]
        folder: Option<PathBuf>,

        /// Files for the day, first one is shown; none clears the day
        files: Vec<PathBuf>,
    },

    /// Set the weekday-mode rotation interval
    DayInterval {
        /// Minutes
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        minutes: u64,
    },

    /// Show the current rotation state
    Status,

    /// Change the wallpaper now
    Next,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Change every N minutes
    Time,
    /// One wallpaper per day of the week
    Weekday,
}

impl From<ModeArg> for RotationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Time => RotationMode::Time,
            ModeArg::Weekday => RotationMode::Weekday,
        }
    }
}

fn parse_day(input: &str) -> std::result::Result<String, String> {
    parse_weekday(input).ok_or_else(|| {
        format!(
            "invalid day '{}' (expected 0-6 or a day name such as 'monday')",
            input
        )
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut store = match cli.config {
        Some(path) => ConfigStore::open(path),
        None => ConfigStore::open_default()?,
    };

    let ok = match cli.command {
        Commands::Add { file } => add(&mut store, &file)?,
        Commands::Remove { file } => remove(&mut store, &file)?,
        Commands::Clear => {
            store.config_mut().clear_wallpapers();
            save(&mut store)?;
            println!("✓ Rotation list cleared");
            true
        }
        Commands::List => {
            list(store);
            true
        }
        Commands::Mode { mode } => {
            store.config_mut().mode = mode.into();
            save(&mut store)?;
            println!("✓ Mode set to {}", store.config().mode.as_str());
            true
        }
        Commands::Interval { minutes } => {
            store.config_mut().interval_minutes = minutes;
            save(&mut store)?;
            println!("✓ Interval set to {} min", minutes);
            true
        }
        Commands::Folder { dir } => folder(&mut store, &dir)?,
        Commands::Manual => {
            store.config_mut().use_manual_list();
            save(&mut store)?;
            println!(
                "✓ Using the rotation list ({} file(s))",
                store.config().wallpapers.len()
            );
            true
        }
        Commands::Day { day, folder, files } => set_day(&mut store, &day, folder, &files)?,
        Commands::DayInterval { minutes } => {
            store.config_mut().weekday_rotation_minutes = minutes;
            save(&mut store)?;
            println!("✓ Weekday rotation interval set to {} min", minutes);
            true
        }
        Commands::Status => {
            status(store);
            true
        }
        Commands::Next => next(store),
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn save(store: &mut ConfigStore) -> Result<()> {
    if !store.save() {
        anyhow::bail!("Failed to save configuration to {}", store.path().display());
    }
    Ok(())
}

/// Check that `file` exists and has a supported extension, reporting why not
fn validate_media(file: &Path) -> bool {
    if !file.is_file() {
        eprintln!("✗ File not found: {}", file.display());
        return false;
    }
    if !is_supported(file) {
        eprintln!(
            "✗ Unsupported file type: {} (supported: {}, {})",
            file.display(),
            IMAGE_EXTENSIONS.join(", "),
            VIDEO_EXTENSIONS.join(", ")
        );
        return false;
    }
    true
}

fn absolute_string(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    Ok(absolute.to_string_lossy().to_string())
}

fn add(store: &mut ConfigStore, file: &Path) -> Result<bool> {
    if !validate_media(file) {
        return Ok(false);
    }

    let path = absolute_string(file)?;
    let item = MediaItem::classify(&path);
    if !store.config_mut().add_wallpaper(path.clone()) {
        println!("ℹ Already in rotation: {}", path);
        return Ok(true);
    }
    save(store)?;

    println!("✓ Added {}: {}", item.kind_label(), path);
    println!("  {} file(s) in rotation", store.config().wallpapers.len());
    Ok(true)
}

fn remove(store: &mut ConfigStore, file: &Path) -> Result<bool> {
    let as_given = file.to_string_lossy().to_string();
    let absolute = absolute_string(file)?;

    let config = store.config_mut();
    if !config.remove_wallpaper(&as_given) && !config.remove_wallpaper(&absolute) {
        eprintln!("✗ Not in rotation: {}", as_given);
        return Ok(false);
    }
    save(store)?;

    println!("✓ Removed {}", as_given);
    Ok(true)
}

fn folder(store: &mut ConfigStore, dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        eprintln!("✗ Not a directory: {}", dir.display());
        return Ok(false);
    }

    let path = absolute_string(dir)?;
    let found = list_media(&path).len();
    store.config_mut().use_folder_source(path.clone());
    save(store)?;

    println!("✓ Using folder {} ({} supported file(s))", path, found);
    Ok(true)
}

fn set_day(
    store: &mut ConfigStore,
    day: &str,
    folder: Option<PathBuf>,
    files: &[PathBuf],
) -> Result<bool> {
    let name = weekday_name(day).unwrap_or(day);

    let playlist = match folder {
        Some(dir) => {
            if !dir.is_dir() {
                eprintln!("✗ Not a directory: {}", dir.display());
                return Ok(false);
            }
            WeekdayPlaylist {
                use_folder: true,
                folder: Some(absolute_string(&dir)?),
                images: Vec::new(),
            }
        }
        None => {
            let mut images = Vec::with_capacity(files.len());
            for file in files {
                if !validate_media(file) {
                    return Ok(false);
                }
                let path = absolute_string(file)?;
                if !images.contains(&path) {
                    images.push(path);
                }
            }
            WeekdayPlaylist {
                use_folder: false,
                folder: None,
                images,
            }
        }
    };

    let summary = match (&playlist.folder, playlist.images.len()) {
        (Some(dir), _) => format!("folder {}", dir),
        (None, 0) => "nothing (cleared)".to_string(),
        (None, n) => format!("{} file(s)", n),
    };

    store.config_mut().set_weekday_playlist(day, playlist);
    save(store)?;

    println!("✓ {} set to {}", name, summary);
    Ok(true)
}

fn engine(store: ConfigStore) -> RotationEngine<SystemDesktop> {
    RotationEngine::new(store, Applier::new(SystemDesktop))
}

fn marker(path: &Path) -> &'static str {
    if common::is_video(path) { "[video]" } else { "[image]" }
}

fn list(store: ConfigStore) {
    let engine = engine(store);
    let config = engine.config();

    match config.mode {
        RotationMode::Time => {
            let source = engine.active_source();
            let label = if config.use_folder {
                format!(
                    "folder {}",
                    config.wallpaper_folder.as_deref().unwrap_or("(not set)")
                )
            } else {
                "rotation list".to_string()
            };
            println!("Time mode, {} ({} item(s)):", label, source.len());

            let next = if config.current_index < source.len() {
                config.current_index
            } else {
                0
            };
            for (i, path) in source.iter().enumerate() {
                let cursor = if i == next { "→" } else { " " };
                println!("  {} {:>3}. {} {}", cursor, i + 1, marker(path), path.display());
            }
        }
        RotationMode::Weekday => {
            println!("Weekday mode:");
            for key in WEEKDAY_KEYS {
                let name = weekday_name(key).unwrap_or(key);
                let source = engine.day_source(key);
                match source.first() {
                    Some(first) => println!(
                        "  {:<9} {} {} ({} item(s))",
                        name,
                        marker(first),
                        first.display(),
                        source.len()
                    ),
                    None => println!("  {:<9} (none)", name),
                }
            }
        }
    }
}

fn status(store: ConfigStore) {
    let now = chrono::Local::now().naive_local();
    let engine = engine(store);
    let config = engine.config();

    println!("Rotawall Status:");
    println!("  Config: {}", engine.store().path().display());
    println!("  Mode: {}", config.mode.as_str());

    match config.mode {
        RotationMode::Time => {
            let source = if config.use_folder {
                format!(
                    "folder {}",
                    config.wallpaper_folder.as_deref().unwrap_or("(not set)")
                )
            } else {
                "rotation list".to_string()
            };
            println!("  Source: {}", source);
            println!("  Items: {}", engine.active_source().len());
            println!("  Interval: {} min", config.interval().num_minutes());
        }
        RotationMode::Weekday => {
            let key = weekday_key(now.date());
            println!(
                "  Today: {} ({} item(s))",
                weekday_name(&key).unwrap_or(&key),
                engine.day_source(&key).len()
            );
        }
    }

    match config.last_change {
        Some(ts) => println!("  Last change: {}", ts.format("%Y-%m-%d %H:%M:%S")),
        None => println!("  Last change: never"),
    }

    if let Some(seconds) = engine.seconds_until_next_change(now) {
        println!("  Next change in: {:02}:{:02}", seconds / 60, seconds % 60);
    }
}

fn next(store: ConfigStore) -> bool {
    let mut engine = engine(store);
    match engine.change_now(chrono::Local::now().naive_local()) {
        ChangeOutcome::Applied(item) => {
            println!("✓ Wallpaper set: {}", item.path().display());
            true
        }
        ChangeOutcome::NoMedia => {
            eprintln!("✗ No wallpapers available for the current mode");
            false
        }
        ChangeOutcome::Failed(item) => {
            eprintln!("✗ Failed to set wallpaper: {}", item.path().display());
            false
        }
    }
}
