use crate::observation::Settings;
use crate::parameters::Parameters;

/// Where the binary reads its input from and writes its output to.
pub struct Files {
    pub zones: String,
    pub crops: String,
    pub parameters: Option<String>,
    /// stdout if not given
    pub output: Option<String>,
}

impl Default for Files {
    fn default() -> Self {
        Files {
            zones: "data/zones.json".to_string(),
            crops: "data/crops.json".to_string(),
            parameters: None,
            output: None,
        }
    }
}

/// The value of `--parameters`, looked up before the full parse so that the
/// file can provide defaults for all other options.
pub fn parameter_file(args: &[String]) -> Option<String> {
    args.iter()
        .position(|a| a == "--parameters")
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| {
            args.iter()
                .find_map(|a| a.strip_prefix("--parameters=").map(String::from))
        })
}

/// Override `p`, `o` and `files` from command line arguments (including the
/// program name). Returns the exit code on `--help` or a parse error.
pub fn parse_args(
    args: Vec<String>,
    p: &mut Parameters,
    o: &mut Settings,
    files: &mut Files,
) -> Result<(), i32> {
    let mut parser = argparse::ArgumentParser::new();
    parser.set_description(
        "Simulate seasonal crop choices of INDIVIDUAL and SHARED farmers",
    );
    parser.refer(&mut files.zones).add_option(
        &["--zones"],
        argparse::Store,
        "JSON file with the zone catalog",
    );
    parser.refer(&mut files.crops).add_option(
        &["--crops"],
        argparse::Store,
        "JSON file with the crop catalog",
    );
    parser.refer(&mut files.parameters).add_option(
        &["--parameters"],
        argparse::StoreOption,
        "JSON file with parameters; command line options take precedence",
    );
    parser.refer(&mut files.output).add_option(
        &["--output"],
        argparse::StoreOption,
        "write the results here instead of to stdout",
    );
    parser.refer(&mut p.seed).add_option(&["--seed"], argparse::Store, "random seed");
    parser.refer(&mut p.n_agents).add_option(
        &["--agents"],
        argparse::Store,
        "number of farmers, must be even",
    );
    parser.refer(&mut p.n_seasons).add_option(
        &["--seasons"],
        argparse::Store,
        "number of seasons to simulate",
    );
    parser.refer(&mut p.w_own).add_option(
        &["--w-own"],
        argparse::Store,
        "weight of the personal score for SHARED farmers",
    );
    parser.refer(&mut p.w_social).add_option(
        &["--w-social"],
        argparse::Store,
        "weight of the social score for SHARED farmers",
    );
    parser.refer(&mut p.propagation_mode).add_option(
        &["--propagation"],
        argparse::Store,
        "knowledge SHARED farmers consult: zone, neighbor or both",
    );
    parser.refer(&mut p.social_metric).add_option(
        &["--social-metric"],
        argparse::Store,
        "outcome the social signal is built from: yield or profit",
    );
    parser.refer(&mut p.social_normalization).add_option(
        &["--social-normalization"],
        argparse::Store,
        "mapping of the social signal onto [0, 1]: relative, min_max or rank",
    );
    parser.refer(&mut p.learning_speed_shared).add_option(
        &["--learning-speed-shared"],
        argparse::Store,
        "weight of the newest season in the pooled community averages",
    );
    parser.refer(&mut p.yield_variability.0).add_option(
        &["--yield-variability-min"],
        argparse::Store,
        "lower bound of the yield multiplier",
    );
    parser.refer(&mut p.yield_variability.1).add_option(
        &["--yield-variability-max"],
        argparse::Store,
        "upper bound of the yield multiplier",
    );
    parser.refer(&mut p.price_volatility).add_option(
        &["--price-volatility"],
        argparse::Store,
        "relative price noise for crops without their own",
    );
    parser.refer(&mut p.daily_wage).add_option(
        &["--daily-wage"],
        argparse::Store,
        "agricultural wage per labour day",
    );
    parser.refer(&mut p.shared.cost_efficiency).add_option(
        &["--shared-cost-efficiency"],
        argparse::Store,
        "cost factor of SHARED farmers",
    );
    parser.refer(&mut p.shared.post_harvest_loss).add_option(
        &["--shared-post-harvest-loss"],
        argparse::Store,
        "post-harvest loss of SHARED farmers",
    );
    parser.refer(&mut p.shared.price_premium).add_option(
        &["--shared-price-premium"],
        argparse::Store,
        "price factor of SHARED farmers",
    );
    parser.refer(&mut p.individual.post_harvest_loss).add_option(
        &["--individual-post-harvest-loss"],
        argparse::Store,
        "post-harvest loss of INDIVIDUAL farmers",
    );
    parser.refer(&mut p.topology).add_option(
        &["--topology"],
        argparse::Store,
        "social network: small_world, random or scale_free",
    );
    parser.refer(&mut p.average_degree).add_option(
        &["--average-degree"],
        argparse::Store,
        "average number of neighbours in the social network",
    );
    parser.refer(&mut p.rewiring_probability).add_option(
        &["--rewiring-probability"],
        argparse::Store,
        "rewiring probability of the small-world network",
    );
    parser.refer(&mut p.common_random_numbers).add_option(
        &["--independent-draws"],
        argparse::StoreFalse,
        "do not share random draws between matched twins",
    );
    parser.refer(&mut o.log_every).add_option(
        &["--log-every"],
        argparse::Store,
        "log a summary every this many seasons (0: never)",
    );
    parser.parse(args, &mut std::io::stdout(), &mut std::io::stderr())
}
