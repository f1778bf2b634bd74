use clap::Parser;
use strip_packer::engine::EngineKind;
use strip_packer::render;
use strip_packer::{Item, Solver, SolverConfig};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "strip_packer",
    about = "Exact minimal-height strip packing of grid rectangles"
)]
struct Cli {
    /// Strip width in grid cells
    #[arg(long)]
    width: u32,

    /// Items as WxH or id=WxH (e.g. 6x5 logo=5x4)
    #[arg(long = "item", num_args = 1.., required = true)]
    items: Vec<String>,

    /// Time budget per trial height in ms (0 disables the limit)
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Constraint engine: search or milp
    #[arg(long, default_value = "search", value_parser = parse_engine)]
    engine: EngineKind,

    /// Solve two heights at once
    #[arg(long)]
    speculative: bool,

    /// Show ASCII layout of the strip
    #[arg(long)]
    layout: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Log every trial to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn parse_engine(s: &str) -> Result<EngineKind, String> {
    s.parse()
}

fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!("invalid dimensions '{}', expected WxH", s));
    }
    let w = parts[0]
        .parse::<u32>()
        .map_err(|_| format!("invalid width in '{}'", s))?;
    let h = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid height in '{}'", s))?;
    if w == 0 || h == 0 {
        return Err(format!("dimensions must be non-zero in '{}'", s));
    }
    Ok((w, h))
}

/// `id=WxH`, or `WxH` numbered by position.
fn parse_item(s: &str, position: usize) -> Result<Item, String> {
    let (id, dims) = match s.split_once('=') {
        Some((id, _)) if id.is_empty() => return Err(format!("empty id in '{}'", s)),
        Some((id, dims)) => (id.to_string(), dims),
        None => ((position + 1).to_string(), s),
    };
    let (w, h) = parse_dimensions(dims)?;
    Ok(Item::new(id, w, h))
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let items: Vec<Item> = cli
        .items
        .iter()
        .enumerate()
        .map(|(i, s)| parse_item(s, i))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    let config = SolverConfig {
        engine: cli.engine,
        trial_timeout_ms: (cli.timeout_ms > 0).then_some(cli.timeout_ms),
        speculative: cli.speculative,
    };
    let solver = Solver::new(config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let result = solver.solve_strip(&items, cli.width).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(if e.is_input_error() { 1 } else { 2 });
    });

    if cli.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(2);
            }
        }
        return;
    }

    println!("Strip {}x{}:", result.width, result.height);
    for item in &items {
        if let Some(p) = result.get(&item.id) {
            println!("  {} {} @ ({}, {})", item.id, item.size(), p.x, p.y);
        }
    }
    if cli.layout {
        print!("{}", render::render_strip(&items, &result));
    }
    println!();

    println!(
        "Summary: height {} after {} trial{}, {:.1}% filled",
        result.height,
        result.trials.len(),
        if result.trials.len() == 1 { "" } else { "s" },
        result.fill_percent(&items),
    );
}
