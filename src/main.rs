use pokemon_duel::battle::MAX_TURNS;
use pokemon_duel::pokeapi::DEFAULT_API_BASE;
use pokemon_duel::provider::DEFAULT_CACHE_TTL;
use pokemon_duel::{run, CliOptions, Command};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

fn usage() -> ! {
    eprintln!(
        "Usage: pokemon-duel battle <A> <B> | tally <A> <B> | data [NAME] | serve\n\
         \x20 [--profiles profiles.json] [--api-base URL] [--cache-ttl-ms MS] [--seed SEED]\n\
         \x20 [--max-turns N] [--deadline-ms MS] [--runs N] [--json]"
    );
    std::process::exit(1);
}

fn env_u64(name: &str) -> anyhow::Result<Option<u64>> {
    match env::var(name) {
        Ok(val) => Ok(Some(
            val.parse()
                .map_err(|e| anyhow::anyhow!("{name} must be a number, got {val}: {e}"))?,
        )),
        Err(_) => Ok(None),
    }
}

fn parse_args() -> anyhow::Result<CliOptions> {
    let mut positional = Vec::new();
    let mut profiles_path = None;
    let mut api_base = env::var("POKEAPI_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
    let mut cache_ttl = env_u64("POKEDUEL_CACHE_TTL_MS")?
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_CACHE_TTL);
    let mut seed = None;
    let mut max_turns = MAX_TURNS;
    let mut time_limit = None;
    let mut runs = 100usize;
    let mut json = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--profiles" => {
                profiles_path = Some(args.next().map(PathBuf::from).ok_or_else(|| {
                    anyhow::anyhow!("--profiles requires a path (e.g. --profiles profiles.json)")
                })?);
            }
            "--api-base" => {
                api_base = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--api-base requires a URL"))?;
            }
            "--cache-ttl-ms" => {
                let val = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--cache-ttl-ms requires milliseconds"))?;
                cache_ttl = Duration::from_millis(val.parse()?);
            }
            "--seed" => {
                let val = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--seed requires a number"))?;
                seed = Some(val.parse()?);
            }
            "--max-turns" => {
                let val = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--max-turns requires a number"))?;
                max_turns = val.parse()?;
            }
            "--deadline-ms" => {
                let val = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--deadline-ms requires milliseconds"))?;
                time_limit = Some(Duration::from_millis(val.parse()?));
            }
            "--runs" => {
                let val = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--runs requires a number"))?;
                runs = val.parse()?;
            }
            "--json" => json = true,
            "--help" | "-h" => usage(),
            other if other.starts_with("--") => return Err(anyhow::anyhow!("Unknown argument {other}")),
            other => positional.push(other.to_string()),
        }
    }

    let command = match positional.as_slice() {
        [cmd, a, b] if cmd == "battle" => Command::Battle {
            a: a.clone(),
            b: b.clone(),
        },
        [cmd, a, b] if cmd == "tally" => Command::Tally {
            a: a.clone(),
            b: b.clone(),
            runs,
        },
        [cmd, name] if cmd == "data" => Command::Data {
            name: Some(name.clone()),
        },
        [cmd] if cmd == "data" => Command::Data { name: None },
        [cmd] if cmd == "serve" => Command::Serve,
        _ => usage(),
    };

    Ok(CliOptions {
        command,
        profiles_path,
        api_base,
        cache_ttl,
        seed,
        max_turns,
        time_limit,
        json,
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let opts = parse_args()?;
    run(opts)
}
