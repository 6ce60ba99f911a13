use clap::Parser;
use lava_sim_core::{Lobe, Output, Topography, Vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lava flow deposition demo with configurable parameters
#[derive(Parser, Debug)]
#[command(name = "lava-sim-demo")]
#[command(about = "Headless lava flow deposition demo", long_about = None)]
struct Args {
    /// Map edge length in meters (square map)
    #[arg(long, default_value_t = 200.0)]
    map_size: f64,

    /// Grid cell size in meters
    #[arg(long, default_value_t = 1.0)]
    cell_size: f64,

    /// Base plane gradient (height drop per meter along +x)
    #[arg(long, default_value_t = 0.05)]
    gradient: f64,

    /// Number of lobes in the flow
    #[arg(short, long, default_value_t = 80)]
    lobes: usize,

    /// Lobe thickness in meters
    #[arg(short, long, default_value_t = 0.1)]
    thickness: f64,

    /// Lobe semi-major axis in meters
    #[arg(long, default_value_t = 4.0)]
    semi_major: f64,

    /// Lobe semi-minor axis in meters
    #[arg(long, default_value_t = 2.0)]
    semi_minor: f64,

    /// RNG seed for the orientation jitter
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let n = (args.map_size / args.cell_size).ceil() as usize;
    let coords: Vec<f64> = (0..n).map(|i| i as f64 * args.cell_size).collect();

    // Inclined plane dropping towards +x, so the flow runs right.
    let mut height = vec![0.0; n * n];
    for ix in 0..n {
        for iy in 0..n {
            height[ix * n + iy] = (args.map_size - coords[ix]) * args.gradient;
        }
    }
    let initial_volume: f64 = height.iter().sum::<f64>() * args.cell_size * args.cell_size;

    let mut topo = Topography::new(height, coords.clone(), coords);
    topo.reset_intersection_cache(args.lobes);

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut lobes: Vec<Lobe> = Vec::with_capacity(args.lobes);
    let mut center = Vec2::new(args.map_size * 0.25, args.map_size * 0.5);
    let mut azimuth = 0.0;
    let clearance = 2.0 * args.semi_major;

    for index in 0..args.lobes {
        if topo.is_point_near_boundary(center, clearance) {
            tracing::info!(placed = index, "flow reached the domain boundary");
            break;
        }

        let mut lobe = Lobe::new(
            center,
            Vec2::new(args.semi_major, args.semi_minor),
            azimuth,
        );
        lobe.thickness = args.thickness;
        lobe.n_descendents = (args.lobes - index - 1) as u32;
        topo.add_lobe(&lobe, Some(index));

        // Bud the next lobe from the lowest perimeter point, with a little
        // orientation jitter so the flow meanders.
        let budding = topo.find_preliminary_budding_point(&lobe, 32);
        lobes.push(lobe);
        let Ok(budding) = budding else {
            tracing::warn!(placed = index, "budding point left the domain");
            break;
        };
        let direction = budding - center;
        azimuth = direction.y.atan2(direction.x) + rng.random_range(-0.3..0.3);
        center = budding + 0.8 * args.semi_major * Vec2::new(azimuth.cos(), azimuth.sin());
    }

    topo.accumulate_hazard(&lobes);

    let heights = topo.to_snapshot(Output::Height);
    let hazard = topo.to_snapshot(Output::Hazard);
    let cell_area = heights.cell_size * heights.cell_size;
    let deposited: f64 = heights.data.iter().sum::<f64>() * cell_area - initial_volume;
    let covered = hazard.data.iter().filter(|&&v| v > 0.0).count();
    let max_hazard = hazard.data.iter().fold(0.0f64, |acc, &v| acc.max(v));

    println!("=== Lava flow summary ===");
    println!("Lobes placed:       {}", lobes.len());
    println!("Deposited volume:   {deposited:.2} m^3");
    println!("Cells touched:      {covered} ({cell_area:.1} m^2 each)");
    println!("Peak hazard weight: {max_hazard:.0}");
}
