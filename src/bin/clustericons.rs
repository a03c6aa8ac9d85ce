use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use trackermap::{IconBuilder, MapConfig, PieIconBuilder, TrackerMapResult};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Draw the pie chart icon of a cluster.
///
/// The icon is written as SVG to standard out or to a file.
///
#[derive(Debug, Parser)]
#[clap(name = "clustericons")]
#[clap(author, version, about)]
struct ClusterIconsOptions {
    /// Comma separated record counts per category, in category order, e.g. "0,0,2,1".
    #[clap(parse(try_from_str=parse_stats))]
    stats: Stats,

    /// A JSON configuration file, the coal plant tracker defaults are used without one.
    #[clap(short, long)]
    #[clap(env = "TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Write the SVG here instead of standard out.
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone)]
struct Stats(Vec<u32>);

/// Parse the stats argument.
fn parse_stats(stats_str: &str) -> Result<Stats, Box<dyn std::error::Error + Send + Sync>> {
    let stats = stats_str
        .split(',')
        .map(|n| n.trim().parse::<u32>())
        .collect::<Result<Vec<u32>, _>>()?;

    if stats.iter().sum::<u32>() == 0 {
        return Err("a cluster needs at least one record".into());
    }

    Ok(Stats(stats))
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> TrackerMapResult<()> {
    let ClusterIconsOptions {
        stats: Stats(mut stats),
        config,
        output,
        verbose,
    } = ClusterIconsOptions::parse();

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    SimpleLogger::new().with_level(level).init()?;

    let config = match config {
        Some(path) => MapConfig::load_json(path)?,
        None => MapConfig::default(),
    };

    let num_categories = config.categories.len();
    if stats.len() > num_categories {
        return Err(format!(
            "{} counts given, but there are only {} categories",
            stats.len(),
            num_categories
        )
        .into());
    }
    stats.resize(num_categories, 0);

    let population: u32 = stats.iter().sum();
    let icon = PieIconBuilder.build(&stats, population, &config);

    log::debug!(
        "population {} radius {} with {} slices",
        population,
        icon.radius,
        icon.slices.len()
    );

    let svg = icon.to_svg();
    match output {
        Some(path) => {
            std::fs::write(&path, svg)?;
            log::info!("wrote {}", path.display());
        }
        None => print!("{}", svg),
    }

    Ok(())
}
