use anyhow::{Context, Result, anyhow, bail};
use probemap::{
    about,
    annotation::GeneLookup,
    config::ProbemapConfig,
    ensembl::EnsemblClient,
    karyotype::KaryotypeSource,
    pipeline::Pipeline,
    GeneId, Species,
};
use serde::Serialize;
use std::{env, path::Path};
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!(
        "Usage:\n  \
  probemap_cli --version\n  \
  probemap_cli [--config PATH] platforms\n  \
  probemap_cli [--config PATH] run [PLATFORM...]\n  \
  probemap_cli [--config PATH] resolve INPUT.tsv OCCURRENCES.tsv SPECIES OUTPUT.tsv\n  \
  probemap_cli [--config PATH] lookup GENE_ID\n  \
  probemap_cli [--config PATH] karyotype SPECIES\n\n  \
  Log verbosity follows RUST_LOG (default: info)"
    );
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Could not serialize JSON output")?;
    println!("{text}");
    Ok(())
}

fn parse_global_config_arg(args: &[String]) -> (Option<String>, usize) {
    if args.len() >= 3 && args[1] == "--config" {
        return (Some(args[2].clone()), 3);
    }
    (None, 1)
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        bail!("Missing command");
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }

    let (config_path, cmd_idx) = parse_global_config_arg(&args);
    if args.len() <= cmd_idx {
        usage();
        bail!("Missing command");
    }
    let config = ProbemapConfig::load(config_path.as_deref())?;
    let command = &args[cmd_idx];
    let rest = &args[cmd_idx + 1..];

    match command.as_str() {
        "platforms" => print_json(&config.platforms),
        "run" => {
            let mut pipeline = Pipeline::with_ensembl(config)?;
            let report = pipeline.run(rest)?;
            print_json(&report)
        }
        "resolve" => {
            let [input, occurrences, species, output] = rest else {
                usage();
                bail!("resolve requires: INPUT.tsv OCCURRENCES.tsv SPECIES OUTPUT.tsv");
            };
            let pipeline = Pipeline::with_ensembl(config)?;
            let report = pipeline.resolve_files(
                Path::new(input),
                Path::new(occurrences),
                &Species::new(species.as_str()),
                Path::new(output),
            )?;
            print_json(&report)
        }
        "lookup" => {
            let gene = rest.first().ok_or_else(|| {
                usage();
                anyhow!("Missing gene id for lookup")
            })?;
            let client = EnsemblClient::new(&config.ensembl)?;
            print_json(&client.lookup_gene(&GeneId::new(gene.as_str()))?)
        }
        "karyotype" => {
            if rest.is_empty() {
                usage();
                bail!("Missing species for karyotype");
            }
            let species = Species::new(rest.join(" "));
            let client = EnsemblClient::new(&config.ensembl)?;
            let mut regions = client
                .fetch_karyotype(&species)?
                .into_iter()
                .collect::<Vec<_>>();
            regions.sort();
            print_json(&regions)
        }
        _ => {
            usage();
            Err(anyhow!("Unknown command '{command}'"))
        }
    }
}
