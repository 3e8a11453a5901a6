use std::path::PathBuf;

use clap::Parser;
use log::info;
use wrn::core::DataFormat;
use wrn::nn::GraphResult;
use wrn::{create_wide_residual_network, WrnConfig};

/// Build a Wide Residual Network and print its layer summary.
#[derive(Debug, Parser)]
#[command(name = "wrn", version)]
struct Cli {
    /// JSON file with a network configuration; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Total depth, of the form 6n + 4 (16, 22, 28, 40, ...).
    #[arg(long, conflicts_with = "n")]
    depth: Option<usize>,

    /// Blocks per stage.
    #[arg(short = 'n', long = "blocks")]
    n: Option<usize>,

    /// Width multiplier k.
    #[arg(short = 'k', long)]
    width: Option<usize>,

    #[arg(long)]
    classes: Option<usize>,

    #[arg(long)]
    dropout: Option<f64>,

    /// Per-sample input shape, comma separated, in the chosen data format.
    #[arg(long, value_delimiter = ',')]
    input: Option<Vec<usize>>,

    #[arg(long)]
    channels_first: bool,

    /// Print the graph as JSON instead of the summary table.
    #[arg(long)]
    json: bool,
}

fn build_config(cli: &Cli) -> GraphResult<WrnConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            WrnConfig::from_json_file(path)?
        }
        None => WrnConfig::default(),
    };

    if cli.channels_first {
        config.data_format = DataFormat::ChannelsFirst;
        if cli.config.is_none() && cli.input.is_none() {
            config.input_dim = vec![3, 32, 32];
        }
    }
    if let Some(input) = &cli.input {
        config.input_dim = input.clone();
    }
    if let Some(n) = cli.n {
        config.n = n;
    }
    if let Some(depth) = cli.depth {
        config = config.with_total_depth(depth)?;
    }
    if let Some(k) = cli.width {
        config.k = k;
    }
    if let Some(classes) = cli.classes {
        config.nb_classes = classes;
    }
    if let Some(dropout) = cli.dropout {
        config.dropout = dropout;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let model = create_wide_residual_network(&config)?;

    if cli.json {
        println!("{}", model.to_json()?);
    } else {
        print!("{}", model.summary());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("wrn").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = build_config(&parse(&[])).unwrap();
        assert_eq!(config, WrnConfig::default());
    }

    #[test]
    fn test_flag_overrides() {
        let cli = parse(&["--depth", "16", "-k", "8", "--classes", "100", "--dropout", "0", "--input", "40,40,1"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.n, 2);
        assert_eq!(config.k, 8);
        assert_eq!(config.nb_classes, 100);
        assert_eq!(config.dropout, 0.0);
        assert_eq!(config.input_dim, vec![40, 40, 1]);
    }

    #[test]
    fn test_channels_first_default_input() {
        let config = build_config(&parse(&["--channels-first"])).unwrap();
        assert_eq!(config.data_format, DataFormat::ChannelsFirst);
        assert_eq!(config.input_dim, vec![3, 32, 32]);
        assert!(create_wide_residual_network(&config).is_ok());
    }

    #[test]
    fn test_bad_depth() {
        assert!(build_config(&parse(&["--depth", "27"])).is_err());
    }

    #[test]
    fn test_depth_conflicts_with_n() {
        let args = ["wrn", "--depth", "16", "-n", "2"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let cli = parse(&["--config", "/nonexistent/wrn.json"]);
        assert!(build_config(&cli).is_err());
    }
}
