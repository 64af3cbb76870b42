use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use remat_analysis::{analyze, canonicalize, check_restored, restore_deallocs};
use remat_ir::{pretty_bytes, pretty_duration, read_case, write_case};
use remat_opt::Optimizer;

/// remat — fit traced training schedules into a device-memory budget
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Config file: one case per line, `<input_path> <memory_limit>`
    config: PathBuf,

    /// Directory for optimized schedules (default: next to each input)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Load and analyze the cases without searching
    #[arg(long)]
    dry_run: bool,
}

/// One line of the config file.
#[derive(Clone, Debug, PartialEq, Eq)]
struct CaseSpec {
    input: PathBuf,
    limit: u64,
}

/// Parses a memory limit such as `512MiB` or `8.5G` (1024-based).
fn parse_limit(text: &str) -> Result<u64, String> {
    let split = text
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| format!("no unit in memory limit '{text}'"))?;
    let (number, unit) = text.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| format!("bad number in memory limit '{text}'"))?;
    let scale: u64 = match unit {
        "B" => 1,
        "K" | "KiB" => 1 << 10,
        "M" | "MiB" => 1 << 20,
        "G" | "GiB" => 1 << 30,
        _ => {
            return Err(format!(
                "bad unit '{unit}' in memory limit '{text}' (expected B, K/KiB, M/MiB, or G/GiB)"
            ))
        }
    };
    Ok((value * scale as f64).round() as u64)
}

/// Parses the case list. Blank lines and `#` comments are skipped.
fn parse_config(text: &str) -> Result<Vec<CaseSpec>, String> {
    let mut cases = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(input), Some(limit), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(format!(
                "line {}: expected `<input_path> <memory_limit>`, got '{line}'",
                number + 1
            ));
        };
        let limit = parse_limit(limit).map_err(|e| format!("line {}: {e}", number + 1))?;
        cases.push(CaseSpec {
            input: PathBuf::from(input),
            limit,
        });
    }
    Ok(cases)
}

/// Where the optimized schedule of an input is written.
fn output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "case".into());
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join(format!("{stem}.opt.json"))
}

fn run_case(spec: &CaseSpec, out_dir: Option<&Path>, dry_run: bool) -> miette::Result<()> {
    let text = std::fs::read_to_string(&spec.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", spec.input.display()))?;

    let (operands, loaded) = read_case(&text)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err_with(|| format!("failed to load {}", spec.input.display()))?;
    let (common, origin) = canonicalize(operands, loaded)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err_with(|| format!("failed to canonicalize {}", spec.input.display()))?;

    println!(
        "case {} ({} operators, limit {})",
        spec.input.display(),
        origin.len(),
        pretty_bytes(spec.limit),
    );

    if dry_run {
        let analysis = analyze(&common, &origin).map_err(|e| miette::miette!("{e}"))?;
        println!(
            " > peak memory {}, total time {}",
            pretty_bytes(analysis.memory.peak_memory),
            pretty_duration(analysis.memory.total_time),
        );
        return Ok(());
    }

    let outcome = Optimizer::new(spec.limit)
        .run(&common, origin)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("search failed")?;

    let restored = restore_deallocs(&common, &outcome.best)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("failed to restore release markers")?;
    check_restored(&common, &restored)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("restored schedule failed the self-check")?;

    let dest = output_path(&spec.input, out_dir);
    let serialized = write_case(&common, &restored).map_err(|e| miette::miette!("{e}"))?;
    std::fs::write(&dest, serialized)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to write {}", dest.display()))?;

    println!(
        " > peak memory {}, total time {}, {} iterations, budget {}",
        pretty_bytes(outcome.analysis.memory.peak_memory),
        pretty_duration(outcome.analysis.memory.total_time),
        outcome.iterations,
        if outcome.satisfied { "met" } else { "missed" },
    );
    println!(" > wrote {}", dest.display());
    Ok(())
}

fn run() -> miette::Result<()> {
    env_logger::try_init().ok();

    let cli = Cli::parse();
    let text = std::fs::read_to_string(&cli.config)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.config.display()))?;
    let cases = parse_config(&text).map_err(|e| miette::miette!("{e}"))?;
    if cases.is_empty() {
        return Err(miette::miette!(
            "no cases in {} (expected `<input_path> <memory_limit>` per line)",
            cli.config.display()
        ));
    }

    for spec in &cases {
        run_case(spec, cli.out_dir.as_deref(), cli.dry_run)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    // ---- Argument parsing ----

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["remat", "cases.txt"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("cases.txt"));
        assert!(cli.out_dir.is_none());
        assert!(!cli.dry_run);
    }

    #[test]
    fn cli_all_flags() {
        let cli =
            Cli::try_parse_from(["remat", "cases.txt", "--out-dir", "/tmp/opt", "--dry-run"])
                .unwrap();
        assert_eq!(cli.out_dir.unwrap(), PathBuf::from("/tmp/opt"));
        assert!(cli.dry_run);
    }

    #[test]
    fn cli_requires_config() {
        assert!(Cli::try_parse_from(["remat"]).is_err());
    }

    // ---- parse_limit ----

    #[test]
    fn limit_plain_units() {
        assert_eq!(parse_limit("512B").unwrap(), 512);
        assert_eq!(parse_limit("4K").unwrap(), 4096);
        assert_eq!(parse_limit("4KiB").unwrap(), 4096);
        assert_eq!(parse_limit("3M").unwrap(), 3 << 20);
        assert_eq!(parse_limit("3MiB").unwrap(), 3 << 20);
        assert_eq!(parse_limit("8G").unwrap(), 8 << 30);
        assert_eq!(parse_limit("8GiB").unwrap(), 8 << 30);
    }

    #[test]
    fn limit_decimal_values() {
        assert_eq!(parse_limit("1.5K").unwrap(), 1536);
        assert_eq!(parse_limit("8.5GiB").unwrap(), (8.5 * (1u64 << 30) as f64) as u64);
        assert_eq!(parse_limit("0.5M").unwrap(), 512 << 10);
    }

    #[test]
    fn limit_rejects_missing_or_bad_unit() {
        assert!(parse_limit("1024").unwrap_err().contains("no unit"));
        assert!(parse_limit("2TiB").unwrap_err().contains("bad unit"));
        assert!(parse_limit("2k").unwrap_err().contains("bad unit"));
    }

    #[test]
    fn limit_rejects_bad_number() {
        assert!(parse_limit("1.2.3G").unwrap_err().contains("bad number"));
        assert!(parse_limit("GiB").unwrap_err().contains("bad number"));
    }

    // ---- parse_config ----

    #[test]
    fn config_basic() {
        let cases = parse_config("a.json 8GiB\nb.json 512MiB\n").unwrap();
        assert_eq!(
            cases,
            vec![
                CaseSpec {
                    input: PathBuf::from("a.json"),
                    limit: 8 << 30,
                },
                CaseSpec {
                    input: PathBuf::from("b.json"),
                    limit: 512 << 20,
                },
            ]
        );
    }

    #[test]
    fn config_skips_blanks_and_comments() {
        let cases = parse_config("\n# training cases\na.json 1GiB\n\n").unwrap();
        assert_eq!(cases.len(), 1);
    }

    #[test]
    fn config_rejects_malformed_lines() {
        let err = parse_config("a.json\n").unwrap_err();
        assert!(err.contains("line 1"));
        let err = parse_config("a.json 1GiB extra\n").unwrap_err();
        assert!(err.contains("line 1"));
        let err = parse_config("a.json 1GiB\nb.json nonsense\n").unwrap_err();
        assert!(err.contains("line 2"));
    }

    // ---- output_path ----

    #[test]
    fn output_next_to_input_by_default() {
        assert_eq!(
            output_path(Path::new("/data/resnet.json"), None),
            PathBuf::from("/data/resnet.opt.json")
        );
    }

    #[test]
    fn output_into_requested_directory() {
        assert_eq!(
            output_path(Path::new("/data/resnet.json"), Some(Path::new("/tmp/opt"))),
            PathBuf::from("/tmp/opt/resnet.opt.json")
        );
    }
}
