// main.rs — command line front end for the map merger

use clap::Parser;
use hlmerge_bsp::Map;
use hlmerge_merge::{merge, MergeOptions, MergeOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hlmerge", about = "Merge compiled GoldSrc .bsp maps into one map")]
struct Cli {
    /// Input .bsp files, in series order (at least two)
    #[arg(required = true, num_args = 2..)]
    maps: Vec<PathBuf>,

    /// Output .bsp path
    #[arg(long, short, default_value = "merged.bsp")]
    output: PathBuf,

    /// Padding between arranged maps, in units
    #[arg(
        long,
        num_args = 3,
        value_names = ["X", "Y", "Z"],
        default_values_t = [64.0, 0.0, 0.0],
        allow_hyphen_values = true
    )]
    gap: Vec<f32>,

    /// Keep every map at its compiled position; overlaps become errors
    #[arg(long)]
    nomove: bool,

    /// Skip all series entity rewrites (transitions, spawns, cleanup)
    #[arg(long)]
    noripent: bool,

    /// Rewrite level transitions but skip spawn management scripting
    #[arg(long)]
    noscript: bool,

    /// Keep the inputs' switchable lightstyle numbers as compiled
    #[arg(long = "nomergestyles")]
    no_merge_styles: bool,

    /// More log output (repeatable)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut maps = Vec::with_capacity(cli.maps.len());
    for path in &cli.maps {
        let map = Map::load(path)?;
        info!(
            map = %map.name,
            models = map.models.len(),
            faces = map.faces.len(),
            "loaded"
        );
        maps.push(map);
    }

    let gap = [cli.gap[0], cli.gap[1], cli.gap[2]];
    let requested = cli
        .output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged".to_string());
    let opts = MergeOptions {
        noripent: cli.noripent,
        noscript: cli.noscript,
        nomove: cli.nomove,
        no_merge_styles: cli.no_merge_styles,
        ..Default::default()
    };

    match merge(&maps, &gap, &requested, &opts) {
        MergeOutcome::Merged { map, output_name } => {
            let mut path = cli.output.clone();
            if output_name != requested {
                path.set_file_name(format!("{output_name}.bsp"));
            }
            map.write(&path)?;
            info!(path = %path.display(), "wrote merged map");
            Ok(ExitCode::SUCCESS)
        }
        MergeOutcome::Failed(failure) => {
            error!("{}", failure.error);
            if failure.overflow {
                error!("the combined maps exceed a hard format limit; merge fewer or smaller maps");
            }
            if let (Some(fixes), Some(fixes2)) = (failure.move_fixes, failure.move_fixes2) {
                error!(
                    "to separate the overlapping pair, move the second map by one of \
                     x {:+} / y {:+} / z {:+} (or {:+} / {:+} / {:+})",
                    fixes[0], fixes[1], fixes[2], fixes2[0], fixes2[1], fixes2[2]
                );
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
