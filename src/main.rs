use std::error::Error;
use std::fs::File;
use std::io::BufReader;

use tracing::info;
use tracing_subscriber::EnvFilter;

use model::argparse::{parameter_file, parse_args, Files};
use model::catalog::{Catalog, Crop, Zone};
use model::observation::Settings;
use model::Parameters;

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, Box<dyn Error>> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {}", path, e))?;
    let value = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| format!("cannot parse {}: {}", path, e))?;
    Ok(value)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut p: Parameters = match parameter_file(&args) {
        Some(path) => read_json(&path)?,
        None => Parameters::default(),
    };
    let mut o = Settings::default();
    let mut files = Files::default();
    if let Err(code) = parse_args(args, &mut p, &mut o, &mut files) {
        std::process::exit(code);
    }

    let zones: Vec<Zone> = read_json(&files.zones)?;
    let crops: Vec<Crop> = read_json(&files.crops)?;
    let catalog = Catalog::new(zones, crops)?;
    info!(zones = %files.zones, crops = %files.crops, seed = p.seed, "Starting");

    let output = model::simulate(p, catalog, &o)?;

    match &files.output {
        Some(path) => {
            serde_json::to_writer_pretty(File::create(path)?, &output)?;
            info!(path = %path, "Stored results");
        }
        None => {
            let stdout = std::io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), &output)?;
        }
    }
    Ok(())
}
