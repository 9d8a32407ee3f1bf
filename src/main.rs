use fdhunter::*;
use std::env;
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: fdhunter [options] < table.tsv

Reads a tab-separated table with a header line from standard input and prints its minimal
functional dependencies.

options:
  --name NAME          relation name used in qualified output (default: relation)
  --no-header          the first line is data; columns are named column1, column2, ...
  --null TOKEN         cell text that means null (default: the empty string)
  --null-equals-null   treat null cells as equal to each other
  --row-limit N        only scan the first N rows
  --max-lhs N          don't look for dependencies with more than N columns on the left
  --exhaustive         search the relation for non-dependencies instead of only sampling
  --sequential         validate candidates on one thread
  --qualified          print columns as relation.column
  --stats              print run statistics to standard error

Set RUST_LOG (for example RUST_LOG=fdhunter=debug) to see progress on standard error.";

struct Options {
    tsv: TsvOptions,
    config: DiscoveryConfig,
    qualified: bool,
    stats: bool,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> std::result::Result<Options, String> {
    let mut options = Options {
        tsv: TsvOptions::default(),
        config: DiscoveryConfig::default(),
        qualified: false,
        stats: false,
    };

    fn number(flag: &str, value: Option<String>) -> std::result::Result<i64, String> {
        let value = value.ok_or_else(|| format!("{} needs a value", flag))?;
        value
            .parse()
            .map_err(|_| format!("{} needs a number, not {:?}", flag, value))
    }

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--name" => {
                options.tsv.name = args.next().ok_or("--name needs a value")?;
            }
            "--no-header" => options.tsv.has_header = false,
            "--null" => {
                options.tsv.null_token = Some(args.next().ok_or("--null needs a value")?);
            }
            "--null-equals-null" => options.config.null_equals_null = true,
            "--row-limit" => {
                let limit = number(&arg, args.next())?;
                options.config = options.config.with_row_limit(limit);
            }
            "--max-lhs" => {
                let size = number(&arg, args.next())?;
                options.config = options.config.with_max_lhs_size(size);
            }
            "--exhaustive" => options.config.exhaustive_negative_cover = true,
            "--sequential" => options.config.parallel_validation = false,
            "--qualified" => options.qualified = true,
            "--stats" => options.stats = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            other => return Err(format!("unrecognized argument {:?}", other)),
        }
    }
    Ok(options)
}

fn run(options: Options) -> Result<()> {
    let stdin = io::stdin();
    let mut relation = TsvRelation::new(stdin.lock(), options.tsv)?;
    let mut writer = TextWriter::new(io::stdout(), options.qualified);
    let summary = Discovery::new(options.config).run_with(&mut relation, &mut writer)?;
    writer.finish()?;

    if options.stats {
        eprintln!("{:#?}", summary.statistics);
    }
    if summary.completeness.row_bounded {
        eprintln!("note: row limit reached; dependencies hold on the scanned rows only");
    }
    if summary.completeness.depth_bounded {
        eprintln!("note: left-hand side limit reached; larger dependencies were not explored");
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}\n\n{}", message, USAGE);
            process::exit(2);
        }
    };

    if let Err(e) = run(options) {
        eprintln!("fdhunter: {}", e);
        process::exit(1);
    }
}
