use aviary::birds::{slugify, BirdObservation, BirdSpecies, FitBounds, ImageFit};
use aviary::config::{Config, SourceKind};
use aviary::settings::{marker_scale, ClientState, SettingsLayout, SqliteStorage};
use aviary::source::{BirdData, BirdProvider, FileUpload, FixtureProvider, RemoteProvider};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "aviary")]
#[command(about = "Browse and edit bird species and observations")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/aviary/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Data source to use
  #[arg(long, value_enum)]
  source: Option<SourceKind>,

  /// Backend base URL
  #[arg(long)]
  url: Option<String>,

  /// Page URL carrying the `edit` key
  #[arg(long)]
  page_url: Option<String>,

  /// Also write logs to this file
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Species operations
  #[command(subcommand)]
  Species(SpeciesCommand),
  /// Observation operations
  #[command(subcommand)]
  Observations(ObservationsCommand),
  /// Upload an image and print the stored reference
  Upload { file: PathBuf },
  /// Collection counts
  Stats,
  /// Client settings
  #[command(subcommand)]
  Settings(SettingsCommand),
  /// Visited map markers
  #[command(subcommand)]
  Visited(VisitedCommand),
  /// Stored map zoom level
  #[command(subcommand)]
  Zoom(ZoomCommand),
  /// Clamp an image fit and print its bounds
  Fit {
    scale: f64,
    #[arg(allow_hyphen_values = true)]
    x: f64,
    #[arg(allow_hyphen_values = true)]
    y: f64,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
  },
}

#[derive(Subcommand, Debug)]
enum SpeciesCommand {
  List,
  Show { id: String },
  /// Create or update a species from a JSON file
  Save { file: PathBuf },
  Delete { id: String },
  /// Print the id a species name maps to
  Slug { name: String },
}

#[derive(Subcommand, Debug)]
enum ObservationsCommand {
  List {
    #[arg(long)]
    species: Option<String>,
  },
  /// Create or update an observation from a JSON file
  Save { file: PathBuf },
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
  Show,
  Set { key: String, value: String },
  Reset,
}

#[derive(Subcommand, Debug)]
enum VisitedCommand {
  List,
  Mark { id: String },
  Clear,
}

#[derive(Subcommand, Debug)]
enum ZoomCommand {
  Show,
  Set { zoom: f64 },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = aviary::logging::init(args.log_file.as_deref())?;

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(source) = args.source {
    config.source = source;
  }
  if let Some(url) = args.url {
    config.backend.url = url;
  }
  if let Some(page_url) = args.page_url {
    config.page_url = Some(page_url);
  }
  debug!(?config, "configuration loaded");

  match args.command {
    Command::Species(cmd) => {
      run_species(&open_data(&config)?, &config.backend.url, cmd).await
    }
    Command::Observations(cmd) => run_observations(&open_data(&config)?, cmd).await,
    Command::Upload { file } => {
      run_upload(&open_data(&config)?, &config.backend.url, &file).await
    }
    Command::Stats => run_stats(&open_data(&config)?).await,
    Command::Settings(cmd) => run_settings(&open_state()?, cmd),
    Command::Visited(cmd) => run_visited(&open_state()?, cmd),
    Command::Zoom(cmd) => run_zoom(&open_state()?, cmd),
    Command::Fit {
      scale,
      x,
      y,
      width,
      height,
    } => {
      run_fit(scale, x, y, width, height);
      Ok(())
    }
  }
}

fn open_data(config: &Config) -> Result<BirdData<dyn BirdProvider>> {
  let provider: Arc<dyn BirdProvider> = match config.source {
    SourceKind::Remote => {
      let secret = Config::get_edit_secret();
      let edit_key = config.edit_key(secret.as_deref())?;
      Arc::new(RemoteProvider::connect(&config.backend.url, edit_key)?)
    }
    SourceKind::Fixture => match (&config.fixture.species, &config.fixture.observations) {
      (Some(species), Some(observations)) => {
        Arc::new(FixtureProvider::from_paths(species, observations)?)
      }
      (None, None) => Arc::new(FixtureProvider::bundled()?),
      _ => {
        return Err(eyre!(
          "fixture.species and fixture.observations must be set together"
        ))
      }
    },
  };
  Ok(BirdData::new(provider, config.data_options()))
}

fn open_state() -> Result<ClientState<SqliteStorage>> {
  Ok(ClientState::new(
    SqliteStorage::open()?,
    SettingsLayout::standard(),
  ))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
  serde_json::from_str(&contents).map_err(|e| eyre!("Failed to parse {}: {}", path.display(), e))
}

fn report<T>(action: &str, outcome: &aviary::source::MutationOutcome<T>) {
  if outcome.is_applied() {
    println!("{}", action);
  } else {
    println!("{} ignored: data source is read-only", action);
  }
}

async fn run_species(
  data: &BirdData<dyn BirdProvider>,
  media_url: &str,
  cmd: SpeciesCommand,
) -> Result<()> {
  match cmd {
    SpeciesCommand::List => {
      for species in data.get_bird_species().await?.iter() {
        println!(
          "{:<28} {:<28} {:<24} {}",
          species.id,
          species.common_name,
          species.scientific_name,
          species.effective_status().code()
        );
      }
    }
    SpeciesCommand::Show { id } => match data.get_bird_species_by_id(&id).await? {
      Some(species) => {
        println!("{}", serde_json::to_string_pretty(&species)?);
        for image in &species.images {
          println!("image: {}", image.resolve_url(media_url, None));
        }
      }
      None => return Err(eyre!("Species not found: {}", id)),
    },
    SpeciesCommand::Save { file } => {
      let species: BirdSpecies = read_json(&file)?;
      let outcome = data.save_bird_species(&species).await?;
      report(&format!("Saved species {}", species.id), &outcome);
    }
    SpeciesCommand::Delete { id } => {
      let outcome = data.delete_bird_species(&id).await?;
      report(&format!("Deleted species {}", id), &outcome);
    }
    SpeciesCommand::Slug { name } => println!("{}", slugify(&name)),
  }
  Ok(())
}

async fn run_observations(
  data: &BirdData<dyn BirdProvider>,
  cmd: ObservationsCommand,
) -> Result<()> {
  match cmd {
    ObservationsCommand::List { species } => {
      let observations = match species {
        Some(species_id) => data.get_bird_observations_by_species_id(&species_id).await?,
        None => data.get_bird_observations().await?.to_vec(),
      };
      for o in &observations {
        println!(
          "{:<38} {:<24} {:<12} {:>9.5} {:>10.5}  {}",
          o.id, o.species_id, o.date, o.location.latitude, o.location.longitude, o.title
        );
      }
    }
    ObservationsCommand::Save { file } => {
      let observation: BirdObservation = read_json(&file)?;
      let outcome = data.save_bird_observation(&observation).await?;
      report(&format!("Saved observation {}", observation.id), &outcome);
    }
    ObservationsCommand::Delete { id } => {
      let outcome = data.delete_bird_observation(&id).await?;
      report(&format!("Deleted observation {}", id), &outcome);
    }
  }
  Ok(())
}

fn content_type_for(path: &Path) -> &'static str {
  let ext = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_lowercase);
  match ext.as_deref() {
    Some("jpg") | Some("jpeg") => "image/jpeg",
    Some("png") => "image/png",
    Some("gif") => "image/gif",
    Some("webp") => "image/webp",
    _ => "application/octet-stream",
  }
}

async fn run_upload(
  data: &BirdData<dyn BirdProvider>,
  media_url: &str,
  path: &Path,
) -> Result<()> {
  let bytes =
    std::fs::read(path).map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
  let file_name = path
    .file_name()
    .and_then(|n| n.to_str())
    .ok_or_else(|| eyre!("Invalid file name: {}", path.display()))?
    .to_string();
  let upload = FileUpload {
    file_name,
    content_type: content_type_for(path).to_string(),
    bytes,
  };

  let outcome = data.upload_image(upload).await?;
  match outcome.applied() {
    Some(image) => {
      println!("{}", serde_json::to_string_pretty(&image)?);
      println!("image: {}", image.resolve_url(media_url, None));
    }
    None => println!("Upload ignored: data source is read-only"),
  }
  Ok(())
}

async fn run_stats(data: &BirdData<dyn BirdProvider>) -> Result<()> {
  let species = data.get_bird_species().await?;
  println!("Source:       {}", data.provider().name());
  println!("Species:      {}", data.get_species_count().await?);
  println!("Observations: {}", data.get_observation_count().await?);

  let mut unobserved = Vec::new();
  for s in species.iter() {
    if !data.species_has_observations(&s.id).await? {
      unobserved.push(s.id.as_str());
    }
  }
  if !unobserved.is_empty() {
    println!("Not yet observed: {}", unobserved.join(", "));
  }
  Ok(())
}

fn run_settings(state: &ClientState<SqliteStorage>, cmd: SettingsCommand) -> Result<()> {
  match cmd {
    SettingsCommand::Show => {
      let settings = state.settings()?;
      for group in &state.layout().groups {
        println!("{}", group.name);
        for definition in group.settings.iter().filter(|d| !d.hidden) {
          let value = settings
            .get(definition.key)
            .map(ToString::to_string)
            .unwrap_or_default();
          println!("  {:<36} {:<10} {}", definition.key, value, definition.label);
        }
      }
    }
    SettingsCommand::Set { key, value } => {
      let settings = state.update_setting(&key, &value)?;
      if let Some(v) = settings.get(&key) {
        println!("{} = {}", key, v);
      }
    }
    SettingsCommand::Reset => {
      state.reset_settings()?;
      println!("Settings reset to defaults");
    }
  }
  Ok(())
}

fn run_visited(state: &ClientState<SqliteStorage>, cmd: VisitedCommand) -> Result<()> {
  match cmd {
    VisitedCommand::List => {
      for id in state.visited_markers()? {
        println!("{}", id);
      }
    }
    VisitedCommand::Mark { id } => {
      if !state.mark_visited(&id)? {
        println!("{} was already visited", id);
      }
    }
    VisitedCommand::Clear => state.clear_visited()?,
  }
  Ok(())
}

fn run_zoom(state: &ClientState<SqliteStorage>, cmd: ZoomCommand) -> Result<()> {
  let zoom = match cmd {
    ZoomCommand::Show => state.map_zoom()?,
    ZoomCommand::Set { zoom } => {
      state.set_map_zoom(zoom)?;
      zoom
    }
  };
  println!("zoom {} (marker scale {:.3})", zoom, marker_scale(zoom));
  Ok(())
}

fn run_fit(scale: f64, x: f64, y: f64, width: Option<u32>, height: Option<u32>) {
  let aspect = match (width, height) {
    (Some(w), Some(h)) if w > 0 && h > 0 => f64::from(w) / f64::from(h),
    _ => 1.0,
  };
  let fit = ImageFit::new(scale, x, y).clamped(aspect);
  let bounds = FitBounds::for_scale(fit.scale, aspect);
  println!(
    "scale {:.4} offset ({:.4}, {:.4}) max offset ({:.4}, {:.4})",
    fit.scale, fit.offset_x, fit.offset_y, bounds.max_offset_x, bounds.max_offset_y
  );
}
