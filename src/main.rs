use std::f32::consts::TAU;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

mod camera;
mod demo;
mod math;
mod parser;
mod project;
mod splat;
mod tiles;

use camera::{Camera, CameraParams};
use math::Vec3;
use project::kernel::project_and_compact_splats;
use project::ForwardBuffers;
use splat::{world_extent, Splat};

pub type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(
    name = "splatproj",
    version,
    about = "Forward projection and visibility compaction for tile-based 3D Gaussian splatting"
)]
struct Cli {
    /// Path to a .ply or .splat scene file (runs the demo cloud if omitted)
    input: Option<PathBuf>,
    #[arg(long, help = "Run the built-in demo cloud", conflicts_with = "input")]
    demo: bool,
    #[arg(
        long,
        value_name = "N",
        default_value_t = 45_000,
        help = "Demo cloud size"
    )]
    splat_count: usize,
    #[arg(long, default_value_t = 1280, help = "Image width in pixels")]
    width: u32,
    #[arg(long, default_value_t = 720, help = "Image height in pixels")]
    height: u32,
    #[arg(long, default_value_t = 16, help = "Tile edge in pixels")]
    tile_size: u32,
    #[arg(long, default_value_t = 60.0, help = "Vertical field of view, degrees")]
    fov_deg: f32,
    #[arg(long, default_value_t = 0.2, help = "Near-clip threshold, view units")]
    clip: f32,
    #[arg(
        long,
        value_name = "N",
        default_value_t = 1,
        help = "Number of orbit steps to dispatch"
    )]
    frames: u32,
    #[arg(long, help = "Flip Y axis")]
    flip_y: bool,
    #[arg(long, help = "Flip Z axis")]
    flip_z: bool,
}

fn load_splats_from_cli(cli: &Cli) -> AppResult<Vec<Splat>> {
    if cli.demo || cli.input.is_none() {
        return Ok(demo::generate_demo_splats(cli.splat_count));
    }

    let path = match cli.input.as_ref() {
        Some(path) => path,
        None => return Ok(demo::generate_demo_splats(cli.splat_count)),
    };

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let path_str = path.to_str().ok_or_else(|| {
        format!(
            "Input path contains non-UTF-8 characters: {}",
            path.display()
        )
    })?;

    match ext.as_str() {
        "ply" => parser::ply::load_ply_file(path_str),
        "splat" => parser::dot_splat::load_splat_file(path_str),
        _ => Err(format!(
            "Unsupported input '{}'. Use a .ply, .splat, or --demo",
            path.display()
        )
        .into()),
    }
}

/// AABB center of the cloud plus a bounding radius that includes each
/// splat's own spatial extent, used to auto-frame the camera.
fn scene_bounds(splats: &[Splat]) -> (Vec3, f32) {
    let mut min = Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY);
    let mut max = Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
    for s in splats {
        min.x = min.x.min(s.mean.x);
        min.y = min.y.min(s.mean.y);
        min.z = min.z.min(s.mean.z);
        max.x = max.x.max(s.mean.x);
        max.y = max.y.max(s.mean.y);
        max.z = max.z.max(s.mean.z);
    }
    let center = Vec3::new(
        (min.x + max.x) * 0.5,
        (min.y + max.y) * 0.5,
        (min.z + max.z) * 0.5,
    );

    let mut radius = 0.0_f32;
    for s in splats {
        radius = radius.max((s.mean - center).length() + world_extent(s));
    }
    (center, radius)
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let mut splats = load_splats_from_cli(&cli)?;
    if splats.is_empty() {
        return Err("scene contains no splats".into());
    }
    if cli.flip_y || cli.flip_z {
        for splat in &mut splats {
            if cli.flip_y {
                splat.mean.y = -splat.mean.y;
            }
            if cli.flip_z {
                splat.mean.z = -splat.mean.z;
            }
        }
    }

    let (center, scene_radius) = scene_bounds(&splats);
    let tiles_x = cli.width.div_ceil(cli.tile_size.max(1));
    let tiles_y = cli.height.div_ceil(cli.tile_size.max(1));
    println!(
        "{} splats, scene radius {:.2}, image {}x{}, {}x{} tiles of {}px",
        splats.len(),
        scene_radius,
        cli.width,
        cli.height,
        tiles_x,
        tiles_y,
        cli.tile_size
    );

    let mut out = ForwardBuffers::for_count(splats.len());
    let orbit_radius = (scene_radius * 2.2).max(1.0);
    let frames = cli.frames.max(1);

    for frame in 0..frames {
        let angle = frame as f32 / frames as f32 * TAU;
        let position = center
            + Vec3::new(
                angle.cos() * orbit_radius,
                orbit_radius * 0.25,
                angle.sin() * orbit_radius,
            );
        let mut camera = Camera::new(position, 0.0, 0.0);
        camera.fov = cli.fov_deg.to_radians();
        camera.look_at_target(center);

        let params =
            CameraParams::from_camera(&camera, (cli.width, cli.height), cli.tile_size, cli.clip);

        let start = Instant::now();
        let visible = project_and_compact_splats(&splats, &params, &mut out);
        let elapsed = start.elapsed();

        let tile_refs: u64 = out.tile_hits[..visible].iter().map(|&h| h as u64).sum();
        println!(
            "frame {frame:>3}: {visible:>8} visible ({:>5.1}%), {tile_refs:>9} tile refs, {:.2?}",
            visible as f32 / splats.len() as f32 * 100.0,
            elapsed
        );
    }

    Ok(())
}
