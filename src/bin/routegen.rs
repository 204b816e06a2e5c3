use clap::Parser;
use wayfarer::config::{load_params, RouteParams};
use wayfarer::errors::{WayfarerError, WayfarerResult};
use wayfarer::routes::{NetworkBuilder, RouteNetwork};
use wayfarer::worldgen::{WorldConfig, WorldGenerator};
use wayfarer::WorldMesh;

#[derive(Parser, Clone)]
#[command(name = "routegen")]
#[command(about = "Generate a world mesh and synthesize its transport network")]
struct Args {
    /// Random seed for reproducible generation
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// World extent in map units (format: WIDTHxHEIGHT)
    #[arg(long, default_value = "400x300")]
    size: String,

    /// Number of mesh cells
    #[arg(long, default_value = "2000")]
    cells: usize,

    /// Number of settlements to place
    #[arg(long, default_value = "24")]
    settlements: usize,

    /// Number of capitals among the settlements
    #[arg(long, default_value = "4")]
    capitals: usize,

    /// Route parameter file (TOML); defaults are used when omitted
    #[arg(long)]
    params: Option<String>,

    /// Output file for the generated network
    #[arg(long)]
    output: Option<String>,
}

fn parse_size(size: &str) -> WayfarerResult<(f64, f64)> {
    let parts: Vec<&str> = size.split('x').collect();
    if parts.len() != 2 {
        return Err(WayfarerError::InvalidParams {
            reason: format!("size must be WIDTHxHEIGHT, got '{size}'"),
        });
    }
    let width: f64 = parts[0].parse().map_err(|_| WayfarerError::InvalidParams {
        reason: format!("invalid width '{}'", parts[0]),
    })?;
    let height: f64 = parts[1].parse().map_err(|_| WayfarerError::InvalidParams {
        reason: format!("invalid height '{}'", parts[1]),
    })?;
    Ok((width, height))
}

fn main() -> WayfarerResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let (width, height) = parse_size(&args.size)?;

    let params = match &args.params {
        Some(path) => load_params(path)?,
        None => RouteParams::default(),
    };

    let config = WorldConfig {
        seed: args.seed,
        width,
        height,
        cell_count: args.cells,
        settlement_count: args.settlements,
        capital_count: args.capitals,
        ..Default::default()
    };
    let mut mesh = WorldGenerator::new(config)?.generate()?;

    let network = NetworkBuilder::new(&mut mesh, &params)?.regenerate()?;

    print_network_summary(&mesh, &network);

    if let Some(output) = &args.output {
        network.save_to_file(output)?;
        println!("\nNetwork saved to: {output}");
    }

    Ok(())
}

fn print_network_summary(mesh: &WorldMesh, network: &RouteNetwork) {
    let network_cells = mesh.road_usage.iter().filter(|&&u| u > 0).count();
    let junctions = mesh.junction_usage.iter().filter(|&&u| u > 0).count();
    let capitals = mesh.settlements.iter().filter(|s| s.is_capital).count();
    let ports = mesh.settlements.iter().filter(|s| s.port > 0).count();

    println!("Network summary:");
    println!(
        "  World: {} cells, {} settlements ({} capitals, {} ports)",
        mesh.len(),
        mesh.settlements.len(),
        capitals,
        ports
    );
    println!(
        "  Main roads: {} segments, {} cells",
        network.main.len(),
        network.main.iter().map(|s| s.cells.len()).sum::<usize>()
    );
    println!(
        "  Trails: {} segments, {} cells",
        network.small.len(),
        network.small.iter().map(|s| s.cells.len()).sum::<usize>()
    );
    println!(
        "  Sea routes: {} segments, {} cells",
        network.oceanic.len(),
        network.oceanic.iter().map(|s| s.cells.len()).sum::<usize>()
    );
    println!("  Cells on the network: {network_cells}, junctions: {junctions}");
}
