use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;

use slimm_rs::config::{BinWidth, ProfileOptions, Rank, ValidityRule};
use slimm_rs::error::Result;
use slimm_rs::refmap::ReferenceMap;
use slimm_rs::taxdb::Taxonomy;
use slimm_rs::{alignment_files_in, profile_batch};

#[derive(Parser)]
#[command(
    name = "slimm-rs",
    version,
    about = "Species level identification of microbes from metagenome alignments"
)]
struct Cli {
    /// SAM/BAM file, or a directory of them
    input: PathBuf,

    /// taxDB file (<taxid>\t<parent>\t<name>\t<rank>), or nodes.dmp with --ncbi-names
    #[arg(long)]
    taxonomy: PathBuf,

    /// names.dmp; switches the taxonomy loader to the NCBI dump format
    #[arg(long)]
    ncbi_names: Option<PathBuf>,

    /// reference name -> taxon ID table
    #[arg(long)]
    ref_map: Option<PathBuf>,

    /// prepended to every output file name
    #[arg(short, long, default_value = "")]
    output_prefix: String,

    #[arg(short, long, default_value = "species")]
    rank: Rank,

    /// mass fraction used for the coverage and read-count cutoffs
    #[arg(short = 'c', long, default_value_t = 0.99)]
    cutoff: f64,

    /// fixed bin width; 0 derives it from --min-reads
    #[arg(short = 'w', long, default_value_t = 0)]
    bin_width: u32,

    /// reads per bin targeted by the derived bin width, and the min-reads rule threshold
    #[arg(short = 'm', long, default_value_t = 100)]
    min_reads: u32,

    /// validity rules a reference must all pass
    #[arg(long, value_delimiter = ',', default_value = "unique-coverage")]
    rules: Vec<ValidityRule>,

    /// worker threads for directory input (0 = all cores)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    #[arg(short, long)]
    verbose: bool,
}

fn spinner(color: &str, msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let template = format!("{{spinner:.{color}}} {{msg}}");
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&template)
    {
        spinner.set_style(style);
    }
    spinner.set_message(msg.to_string());
    spinner
}

fn run(cli: Cli) -> Result<bool> {
    let options = ProfileOptions {
        coverage_quantile: cli.cutoff,
        bin_width: if cli.bin_width == 0 {
            BinWidth::Auto { min_reads: cli.min_reads }
        } else {
            BinWidth::Fixed(cli.bin_width)
        },
        min_reads: cli.min_reads,
        rank: cli.rank,
        validity_rules: cli.rules,
    };
    options.validate()?;

    if cli.threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
        {
            log::warn!("could not size thread pool: {e}");
        }
    }

    // 1. Shared inputs, loaded once
    let sp = spinner("blue", "Loading taxonomy...");
    let taxonomy = match &cli.ncbi_names {
        Some(names) => Taxonomy::from_ncbi_dump(&cli.taxonomy, names)?,
        None => Taxonomy::from_taxdb(&cli.taxonomy)?,
    };
    let ref_map = match &cli.ref_map {
        Some(path) => ReferenceMap::from_file(path)?,
        None => ReferenceMap::new(),
    };
    sp.finish_with_message(format!("Loaded {} taxa.", taxonomy.len()));

    // 2. Inputs
    let inputs = if cli.input.is_dir() {
        alignment_files_in(&cli.input)?
    } else {
        vec![cli.input.clone()]
    };

    // 3. Profile
    let sp = spinner("green", &format!("Profiling {} file(s)...", inputs.len()));
    let outcomes = profile_batch(&inputs, &cli.output_prefix, &taxonomy, &ref_map, &options);
    sp.finish_with_message("Profiling finished.");

    let mut all_ok = true;
    for (input, outcome) in outcomes {
        match outcome {
            Ok((features, report)) => log::info!(
                "{} -> {}, {}",
                input.display(),
                features.display(),
                report.display()
            ),
            Err(e) => {
                all_ok = false;
                eprintln!("{}: {e}", input.display());
            }
        }
    }
    Ok(all_ok)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
