//! March simulation
//! Two armies wander a road map hour by hour, reporting every decision point
//! and pushing each other apart when their columns collide

use std::path::PathBuf;

use clap::Parser;
use marchline::campaign::{Army, ArmyId, ArmyOrder, Formation, Motion, RoadNetwork};
use marchline::core::{set_config, MarchConfig, MarchError, NodeId, PolityId, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// March simulation - armies moving as columns on a road network
#[derive(Parser, Debug)]
#[command(name = "march_sim")]
#[command(about = "Simulate armies marching across a road map")]
struct Args {
    /// Road map to load
    #[arg(long, default_value = "data/maps/borderlands.json")]
    map: PathBuf,

    /// Optional TOML file with march tunables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting node of the first army
    #[arg(long, default_value = "Duncairn")]
    start: String,

    /// Random seed for reproducible runs (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Days to simulate
    #[arg(long, default_value_t = 10)]
    days: u32,

    /// Leagues marched per hour
    #[arg(long, default_value_t = 0.125)]
    speed: f64,

    /// Mass outside hostile strongholds instead of marching in
    #[arg(long, default_value_t = false)]
    gather: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("marchline=info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        tracing::error!("march simulation failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    if let Some(path) = &args.config {
        let config = MarchConfig::load_from_toml(path)?;
        if set_config(config).is_err() {
            tracing::warn!("march config already set, ignoring {}", path.display());
        }
    }

    let net = RoadNetwork::load_from_file(&args.map)?;
    if net.node_count() < 2 {
        return Err(MarchError::InvalidAction(
            "map needs at least two nodes".to_string(),
        ));
    }
    let start = net
        .node_by_name(&args.start)
        .ok_or_else(|| MarchError::UnknownNode(args.start.clone()))?;

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    tracing::info!("seed {}", seed);

    let rival_start = loop {
        let candidate = random_node(&net, &mut rng);
        if candidate != start {
            break candidate;
        }
    };

    let mut armies = vec![
        Army::new(
            ArmyId(1),
            "Host of Duncairn".to_string(),
            PolityId(1),
            vec![
                Formation::infantry("Spears", 9_000),
                Formation::cavalry("Riders", 1_200),
                Formation::infantry("Baggage", 0).with_wagons(20),
            ],
            start,
            &net,
        )?,
        Army::new(
            ArmyId(2),
            "Greywatch Company".to_string(),
            PolityId(2),
            vec![
                Formation::infantry("Pikes", 6_000).heavy(),
                Formation::cavalry("Lances", 2_000).heavy(),
            ],
            rival_start,
            &net,
        )?,
    ];
    for army in &armies {
        tracing::info!(
            "{} musters at {}: {} warriors, column {:.3} leagues",
            army.name,
            net.name_of(start_of(army)),
            army.warriors(),
            army.column_length()
        );
    }

    for hour in 0..args.days * 24 {
        for army in armies.iter_mut() {
            if army.orders.is_none() {
                give_orders(army, args.gather, &net, &mut rng)?;
            }
            match army.march(args.speed, &net) {
                Ok(events) => {
                    for event in events {
                        println!(
                            "day {:>2} hour {:>2}  {:<20} {}",
                            hour / 24 + 1,
                            hour % 24,
                            army.name,
                            event
                        );
                    }
                }
                Err(MarchError::NoPath { from, to }) => {
                    tracing::warn!("{} finds no road from {} to {}", army.name, from, to);
                    army.orders = None;
                }
                Err(e) => return Err(e),
            }
        }

        let (first, rest) = armies.split_at_mut(1);
        let (a, b) = (&mut first[0], &mut rest[0]);
        let quartered = a.position.motion(false, &net)? == Motion::Holding
            && b.position.motion(false, &net)? == Motion::Holding;
        if quartered && a.position.lead() == b.position.lead() {
            // Both resting on one node with no heading to withdraw along
            tracing::debug!("{} and {} share quarters", a.name, b.name);
        } else if a.position.intersects_column(&b.position, &net)? {
            tracing::info!("{} and {} collide", a.name, b.name);
            a.position.deconflict_from(&mut b.position, &net)?;
            tracing::info!(
                "separated: {} at {}, {} at {}",
                a.name,
                a.position,
                b.name,
                b.position
            );
            reissue(a, &net)?;
            reissue(b, &net)?;
        }
    }

    for army in &armies {
        println!("{} ends at {}", army.name, army.position);
    }
    Ok(())
}

fn random_node(net: &RoadNetwork, rng: &mut ChaCha8Rng) -> NodeId {
    NodeId(rng.gen_range(0..net.node_count() as u32))
}

fn start_of(army: &Army) -> NodeId {
    army.head().unwrap_or(NodeId(0))
}

fn give_orders(
    army: &mut Army,
    gather: bool,
    net: &RoadNetwork,
    rng: &mut ChaCha8Rng,
) -> Result<()> {
    let here = start_of(army);
    let destination = loop {
        let candidate = random_node(net, rng);
        if candidate != here {
            break candidate;
        }
    };
    let info = net.node(destination)?;
    let hostile = info.held_by.is_some_and(|holder| holder != army.faction);
    let ordered = if gather && info.is_stronghold() && hostile {
        army.order_gather_at(destination, net)
    } else {
        army.order_march_to(destination, net)
    };
    match ordered {
        Ok(()) => tracing::info!("{} sets out for {}", army.name, info.name),
        Err(MarchError::NoPath { .. }) => {
            tracing::warn!("{} finds no open road to {}", army.name, info.name)
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Replan after being pushed off the road the army was following
fn reissue(army: &mut Army, net: &RoadNetwork) -> Result<()> {
    let replanned = match army.orders {
        Some(ArmyOrder::MarchTo(node)) => army.order_march_to(node, net),
        Some(ArmyOrder::GatherAt(node)) => army.order_gather_at(node, net),
        Some(ArmyOrder::Halt) | None => Ok(()),
    };
    match replanned {
        Err(MarchError::NoPath { .. }) => {
            army.orders = None;
            Ok(())
        }
        other => other,
    }
}
