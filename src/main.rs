use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medins::config::ModelConfig;
use medins::model::Model;
use medins::population;

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut seed: u64 = 42;
    let mut types: usize = 1_000;
    let mut config_path: Option<String> = None;
    let mut output_path = "evaluations.ndjson".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                i += 1;
                seed = parse_arg(&args, i, "--seed requires a u64");
            }
            "--types" => {
                i += 1;
                types = parse_arg(&args, i, "--types requires a positive integer");
            }
            "--config" => {
                i += 1;
                config_path = Some(arg(&args, i, "--config requires a path").to_string());
            }
            "--output" => {
                i += 1;
                output_path = arg(&args, i, "--output requires a path").to_string();
            }
            other => {
                warn!(argument = other, "ignoring unknown argument");
            }
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => ModelConfig::load(path).unwrap_or_else(|e| fail(&format!("{path}: {e}"))),
        None => ModelConfig::canonical(),
    };
    let model = Model::new(config).unwrap_or_else(|e| fail(&e.to_string()));

    let population = population::sample_population(&model, types, seed)
        .unwrap_or_else(|e| fail(&e.to_string()));
    let evaluations = population::evaluate_population(&model, model.contracts(), &population)
        .unwrap_or_else(|e| fail(&e.to_string()));

    let file = File::create(&output_path)
        .unwrap_or_else(|e| fail(&format!("failed to create {output_path}: {e}")));
    let mut writer = BufWriter::new(file);
    for record in &evaluations {
        let written = serde_json::to_writer(&mut writer, record)
            .map_err(|e| e.to_string())
            .and_then(|()| writeln!(writer).map_err(|e| e.to_string()));
        if let Err(e) = written {
            fail(&format!("failed to write {output_path}: {e}"));
        }
    }
    if let Err(e) = writer.flush() {
        fail(&format!("failed to write {output_path}: {e}"));
    }

    info!(
        types,
        contracts = model.contracts().len(),
        records = evaluations.len(),
        seed,
        output = %output_path,
        "wrote evaluations"
    );
}

fn arg<'a>(args: &'a [String], i: usize, message: &str) -> &'a str {
    args.get(i).map(String::as_str).unwrap_or_else(|| fail(message))
}

fn parse_arg<T: std::str::FromStr>(args: &[String], i: usize, message: &str) -> T {
    arg(args, i, message).parse().unwrap_or_else(|_| fail(message))
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}
