use std::env;
use std::error::Error;
use std::io::{self, BufWriter, Write};

use ontomatch::{Ontology, OntomatchConfig, TaskPool, logging, read_lines, render_matches};
use tracing::{error, info};
use tracing_subscriber::util::SubscriberInitExt;

const USAGE: &str = "usage: ontomatch <config.yaml> <terms.txt> <phrases.txt>";

fn main() -> Result<(), Box<dyn Error>> {
    logging::subscriber(logging::default_filter(), io::stderr).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [config_path, terms_path, phrases_path] = args.as_slice() else {
        return Err(USAGE.into());
    };

    run(config_path, terms_path, phrases_path).inspect_err(|err| {
        error!(error = %err, "ontomatch_failed");
    })
}

fn run(config_path: &str, terms_path: &str, phrases_path: &str) -> Result<(), Box<dyn Error>> {
    let cfg = OntomatchConfig::from_file(config_path)?;
    info!(
        config = %config_path,
        name = cfg.name.as_deref().unwrap_or("unnamed"),
        "config_loaded"
    );

    let ontology = Ontology::from_config(&cfg)?;
    let terms = read_lines(terms_path)?;
    ontology.add_terms(&terms)?;

    let phrases = read_lines(phrases_path)?;
    let pool = TaskPool::new(cfg.matcher.pool_size())?;
    let outcome = ontology.match_phrases(&pool, phrases)?;
    pool.shutdown();

    for failure in &outcome.failures {
        error!(shard = failure.shard, error = %failure.error, "shard_failed");
    }
    let matches = outcome.into_result()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for line in render_matches(&matches)? {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}
