#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod host;

use anyhow::Result;
use structopt::StructOpt;

use footprints::{export, Footprints};
use model::headless::{HeadlessMap, ManualScheduler};
use model::{ProvinceTable, ReplayConfig, RoutePlayer, Viewport};

use self::host::HostLoop;

#[derive(StructOpt)]
#[structopt(name = "replayer", about = "Replay and summarize travel footprints")]
enum Command {
    /// Animate a member's footprints in date order
    Replay {
        #[structopt(flatten)]
        data: DataArgs,
        /// Numeric ID or name
        #[structopt(long)]
        user: String,
        /// A JSON file with any of frames_per_second, samples_per_segment, padding_px
        #[structopt(long)]
        config: Option<String>,
        /// Overrides the config
        #[structopt(long)]
        fps: Option<u32>,
        /// Overrides the config
        #[structopt(long)]
        samples: Option<usize>,
        /// How often the simulated display calls back
        #[structopt(long, default_value = "144")]
        refresh_hz: f64,
        /// Sleep between callbacks, so the replay takes as long as it would on screen
        #[structopt(long)]
        realtime: bool,
        #[structopt(long, default_value = "1280")]
        width: f64,
        #[structopt(long, default_value = "800")]
        height: f64,
        /// Write the animated path as GeoJSON
        #[structopt(long)]
        trail_output: Option<String>,
    },
    /// Which provinces have footprints
    Stats {
        #[structopt(flatten)]
        data: DataArgs,
        /// Numeric ID or name. Everyone if omitted.
        #[structopt(long)]
        user: Option<String>,
        /// A JSON province table to use instead of the built-in one
        #[structopt(long)]
        provinces: Option<String>,
    },
    /// Write a member's route and footprints as GeoJSON, or everyone's routes
    Export {
        #[structopt(flatten)]
        data: DataArgs,
        /// Numeric ID or name. Without it, every member's route is written.
        #[structopt(long)]
        user: Option<String>,
        #[structopt(long)]
        output: String,
    },
    /// List a member's footprints matching a keyword, newest first
    Search {
        #[structopt(flatten)]
        data: DataArgs,
        #[structopt(long)]
        user: String,
        keyword: String,
    },
}

#[derive(StructOpt)]
struct DataArgs {
    /// A directory with users.csv and footprints.csv
    #[structopt(long)]
    data: String,
}

impl DataArgs {
    fn load(&self) -> Result<Footprints> {
        Footprints::load_from_dir(&self.data)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Command::from_args() {
        Command::Replay {
            data,
            user,
            config,
            fps,
            samples,
            refresh_hz,
            realtime,
            width,
            height,
            trail_output,
        } => {
            let mut config = match config {
                Some(path) => ReplayConfig::load(&path)?,
                None => ReplayConfig::default(),
            };
            if let Some(fps) = fps {
                config.frames_per_second = fps;
            }
            if let Some(samples) = samples {
                config.samples_per_segment = samples;
            }
            let host = HostLoop::new(refresh_hz, realtime)?;

            let data = data.load()?;
            let user = data.find_user(&user)?;
            replay(&data, user.id, &config, &host, Viewport::new(width, height), trail_output)
        }
        Command::Stats {
            data,
            user,
            provinces,
        } => {
            let table = match provinces {
                Some(path) => ProvinceTable::load(&path)?,
                None => ProvinceTable::china(),
            };
            let data = data.load()?;
            let (title, locations) = match user {
                Some(user) => {
                    let user = data.find_user(&user)?;
                    (user.name.clone(), data.locations(Some(user.id)))
                }
                None => ("All members".to_string(), data.locations(None)),
            };
            let coverage = table.compute_coverage(locations);
            println!("{title}: {coverage}");
            if coverage.matched_provinces.is_empty() {
                println!("  No provinces recognized");
            }
            for province in &coverage.matched_provinces {
                println!("  - {province}");
            }
            Ok(())
        }
        Command::Export { data, user, output } => {
            let data = data.load()?;
            match user {
                Some(user) => {
                    let user = data.find_user(&user)?;
                    data.export_to_geojson(user.id, &output)
                }
                None => data.export_routes_to_geojson(&output),
            }
        }
        Command::Search {
            data,
            user,
            keyword,
        } => {
            let data = data.load()?;
            let user = data.find_user(&user)?;
            let hits = data.search(user.id, &keyword);
            if hits.is_empty() {
                println!("No footprints of {} match {:?}", user.name, keyword);
            }
            for fp in hits {
                println!(
                    "{}  {}  {}",
                    fp.date.format("%Y-%m-%d"),
                    fp.location,
                    fp.description.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
    }
}

fn replay(
    data: &Footprints,
    user: footprints::UserID,
    config: &ReplayConfig,
    host: &HostLoop,
    viewport: Viewport,
    trail_output: Option<String>,
) -> Result<()> {
    let waypoints = data.waypoints_for_user(user);
    let mut player = RoutePlayer::new(HeadlessMap::new(viewport), ManualScheduler::new());
    player.start(&waypoints, config)?;

    let path = player.path().map(|p| p.to_vec()).unwrap_or_default();
    let zoom = player.fixed_zoom().unwrap_or_default();
    let stats = host.run(&mut player)?;
    println!(
        "Replayed {} of {} footprints for {}: {} frames over {} display callbacks, {:.1}s at zoom {}",
        waypoints.len(),
        data.for_user(user).len(),
        user,
        stats.frames,
        stats.callbacks,
        stats.elapsed_ms / 1000.0,
        zoom
    );

    if let Some(path_out) = trail_output {
        export::write_features(&path_out, vec![export::linestring_feature(&path, "trail")])?;
    }
    Ok(())
}
