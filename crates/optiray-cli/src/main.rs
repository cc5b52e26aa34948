//! optiray CLI - canned tracing scenarios and ray-tree export.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::json;

use optiray::faces::{CircularFace, Face, MeshFace, SphericalCapFace};
use optiray::math::{Dir3, Point3, RigidTransform, Vec3};
use optiray::mesh::TriMesh;
use optiray::{
    CollimatedSource, Optic, RayTree, RefractiveIndex, Scene, TraceLimits, Traceable,
};

#[derive(Parser)]
#[command(name = "optiray")]
#[command(about = "Batch polarization ray tracer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace a collimated beam through a tilted glass slab
    Slab {
        /// Angle of incidence in degrees
        #[arg(long, default_value_t = 30.0)]
        angle: f64,
        /// Slab thickness
        #[arg(long, default_value_t = 10.0)]
        thickness: f64,
        /// Refractive index of the glass
        #[arg(long, default_value_t = 1.5)]
        index: f64,
        /// Keep both Fresnel branches at every interface
        #[arg(long)]
        all_rays: bool,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Fold a collimated beam 90 degrees off a triangulated mirror
    Fold {
        /// Mirror edge length
        #[arg(long, default_value_t = 40.0)]
        size: f64,
        /// Distance from the source plane to the mirror centre
        #[arg(long, default_value_t = 30.0)]
        standoff: f64,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Trace a collimated beam through a plano-convex BK7 lens
    Lens {
        /// Curvature radius of the front surface
        #[arg(long, default_value_t = 50.0)]
        curvature: f64,
        /// Aperture diameter
        #[arg(long, default_value_t = 20.0)]
        diameter: f64,
        /// Centre thickness
        #[arg(long, default_value_t = 4.0)]
        thickness: f64,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Beam radius
    #[arg(long, default_value_t = 5.0)]
    radius: f64,
    /// Grid pitch between rays
    #[arg(long, default_value_t = 1.0)]
    spacing: f64,
    /// Vacuum wavelength in micrometres
    #[arg(long, default_value_t = 0.8)]
    wavelength: f64,
    /// Maximum generations after the source
    #[arg(long, default_value_t = 8)]
    generations: usize,
    /// Drop children weaker than this amplitude
    #[arg(long, default_value_t = 1e-4)]
    min_amplitude: f64,
    /// Write the traced ray tree as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Slab {
            angle,
            thickness,
            index,
            all_rays,
            common,
        } => run_slab(angle, thickness, index, all_rays, &common),
        Commands::Fold {
            size,
            standoff,
            common,
        } => run_fold(size, standoff, &common),
        Commands::Lens {
            curvature,
            diameter,
            thickness,
            common,
        } => run_lens(curvature, diameter, thickness, &common),
    }
}

fn run_slab(angle: f64, thickness: f64, index: f64, all_rays: bool, common: &CommonArgs) -> Result<()> {
    let aperture = 20.0 * common.radius.max(1.0);
    let entry: Box<dyn Face> = Box::new(CircularFace::new(aperture)?.flip());
    let exit: Box<dyn Face> = Box::new(CircularFace::new(aperture)?.at_z(thickness));
    let body = Traceable::new(vec![entry, exit])?;
    let optic = Optic::refractive(
        body,
        RefractiveIndex::constant(index),
        RefractiveIndex::constant(1.0),
    )
    .with_all_rays(all_rays);

    let mut scene = Scene::new();
    scene.add(optic);

    let theta = angle.to_radians();
    let direction = Dir3::new_normalize(Vec3::new(theta.sin(), 0.0, theta.cos()));
    let standoff = 4.0 * common.radius + thickness;
    let centre = Point3::origin() - standoff * direction.into_inner();
    let source = build_source(centre, direction, common);

    info!(
        "slab: {} source rays at {angle} deg into n={index}, thickness {thickness}",
        source.len()
    );
    run_trace(&scene, source, common)
}

fn run_fold(size: f64, standoff: f64, common: &CommonArgs) -> Result<()> {
    let mut face = MeshFace::new(TriMesh::rectangle(size, size)?);
    face.rebuild()?;
    let face: Box<dyn Face> = Box::new(face);
    let body = Traceable::new(vec![face])?.with_transform(
        RigidTransform::rotation_x(std::f64::consts::FRAC_PI_4)
            .then(&RigidTransform::translation(0.0, 0.0, standoff)),
    );

    let mut scene = Scene::new();
    scene.add(Optic::mirror(body));

    let direction = Dir3::new_normalize(Vec3::z());
    let centre = Point3::origin();
    let source = build_source(centre, direction, common);

    info!(
        "fold: {} source rays onto a {size} x {size} triangulated mirror at 45 deg",
        source.len()
    );
    run_trace(&scene, source, common)
}

fn run_lens(curvature: f64, diameter: f64, thickness: f64, common: &CommonArgs) -> Result<()> {
    let front = SphericalCapFace::new(curvature, diameter)?;
    let back_z = thickness;
    let front_box: Box<dyn Face> = Box::new(front);
    let back: Box<dyn Face> = Box::new(CircularFace::new(diameter / 2.0)?.at_z(back_z));
    let body = Traceable::new(vec![front_box, back])?;
    let optic = Optic::refractive(
        body,
        RefractiveIndex::bk7(),
        RefractiveIndex::constant(1.0),
    );

    let mut scene = Scene::new();
    scene.add(optic);

    let direction = Dir3::new_normalize(Vec3::z());
    let centre = Point3::new(0.0, 0.0, -4.0 * common.radius - 1.0);
    let source = build_source(centre, direction, common);

    info!(
        "lens: {} source rays into BK7, R={curvature}, aperture {diameter}",
        source.len()
    );
    run_trace(&scene, source, common)
}

fn build_source(centre: Point3, direction: Dir3, common: &CommonArgs) -> optiray::RayCollection {
    CollimatedSource::new(centre, direction, common.radius)
        .with_spacing(common.spacing)
        .with_wavelength(common.wavelength)
        .build()
}

fn run_trace(scene: &Scene, source: optiray::RayCollection, common: &CommonArgs) -> Result<()> {
    let limits = TraceLimits {
        max_generations: common.generations,
        min_amplitude: common.min_amplitude,
    };
    let tree = scene.trace(source, limits)?;

    for rays in tree.generations() {
        println!(
            "generation {:>2}: {:>6} rays, total power {:.6}",
            rays.generation(),
            rays.len(),
            rays.total_power()
        );
    }
    println!("traced {} rays over {} generations", tree.total_rays(), tree.depth());

    if let Some(path) = &common.output {
        let json = tree_to_json(&tree);
        std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
        info!("wrote ray tree to {}", path.display());
    }
    Ok(())
}

/// Flatten a traced tree into plain JSON for external plotting.
fn tree_to_json(tree: &RayTree) -> serde_json::Value {
    let generations: Vec<serde_json::Value> = tree
        .generations()
        .iter()
        .map(|rays| {
            let entries: Vec<serde_json::Value> = (0..rays.len())
                .map(|i| {
                    let o = rays.origin[i];
                    let d = rays.direction[i];
                    json!({
                        "origin": [o.x, o.y, o.z],
                        "direction": [d.x, d.y, d.z],
                        "max_length": rays.max_length[i],
                        "wavelength": rays.wavelength[i],
                        "amplitude": rays.amplitude(i),
                        "parent": rays.parent_ids[i],
                        "face": rays.face_id[i],
                    })
                })
                .collect();
            json!({
                "generation": rays.generation(),
                "rays": entries,
            })
        })
        .collect();
    json!({ "generations": generations })
}
