use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use sitesmith::build::{build_site, clean};
use sitesmith::config::Config;
use sitesmith::log;
use sitesmith::{deploy, watch};
use std::path::Path;

fn main() {
    std::process::exit(match run() {
        Ok(code) => code,
        Err(err) => {
            log!("error"; "{:#}", err);
            1
        }
    });
}

fn run() -> Result<i32> {
    let config_arg = Arg::with_name("config")
        .long("config")
        .short("c")
        .takes_value(true)
        .value_name("FILE")
        .global(true)
        .help("The configuration file (default: the nearest site.yaml)");
    let matches = App::new("sitesmith")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(config_arg)
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the whole site")
                .arg(
                    Arg::with_name("production")
                        .long("production")
                        .help("Builds for deployment"),
                )
                .arg(
                    Arg::with_name("fail-fast")
                        .long("fail-fast")
                        .help("Stops at the first failure"),
                ),
        )
        .subcommand(
            SubCommand::with_name("watch")
                .about("Builds the site, then rebuilds whatever changes until Ctrl-C"),
        )
        .subcommand(SubCommand::with_name("clean").about("Empties the destination directory"))
        .subcommand(
            SubCommand::with_name("manifest")
                .about("Lists the files of the destination directory for upload"),
        )
        .get_matches();

    let (name, sub) = matches.subcommand();
    let sub = sub.unwrap_or(&matches);
    let mut config = load_config(sub.value_of("config").or_else(|| matches.value_of("config")))?;

    match name {
        "build" => {
            if sub.is_present("production") {
                config.options.production = true;
            }
            Ok(report(build_site(&config, sub.is_present("fail-fast"))))
        }
        "watch" => {
            report(build_site(&config, false));
            watch::watch(&config)?;
            Ok(0)
        }
        "clean" => match clean(&config.options.dist) {
            Ok(()) => Ok(0),
            Err(err) => {
                log!("error"; "{}", err);
                Ok(err.kind().exit_code())
            }
        },
        "manifest" => manifest(&config),
        _ => usage(sub),
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(Path::new(path)),
        None => Config::from_directory(
            &std::env::current_dir().context("Getting the current directory")?,
        ),
    }
}

fn report(report: sitesmith::build::Report) -> i32 {
    if report.is_ok() {
        log!("build"; "ok");
    } else {
        log!("error"; "{} failure(s):", report.failures.len());
        for failure in &report.failures {
            log!("error"; "  {}: {}", failure.unit, failure.error);
        }
    }
    report.exit_code()
}

fn manifest(config: &Config) -> Result<i32> {
    let uploads = deploy::manifest(&config.options)
        .with_context(|| format!("Walking `{}`", config.options.dist.display()))?;
    if let Some(bucket) = &config.options.asset_bucket {
        log!("deploy"; "bucket {}", bucket);
    }
    for upload in &uploads {
        println!(
            "{}\t{}\tCache-Control: {}",
            upload.key, upload.content_type, upload.cache_control
        );
    }
    Ok(0)
}

fn usage(matches: &ArgMatches) -> Result<i32> {
    eprintln!("{}", matches.usage());
    Ok(1)
}
