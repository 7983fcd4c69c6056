use anyhow::{Context, Result, bail};
use cifkit_config::Config;
use cifkit_engine::{
    Condition, Dictionary, Document, ValidationOptions, WriteOptions, all, io, key,
};
use clap::{Parser, Subcommand};
use regex::Regex;
use std::{
    io::{Write, stdout},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

#[derive(Parser, Debug)]
#[command(name = "cifkit", version, about = "Validate, query and rewrite CIF files")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log more; repeat for debug output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a file against a dictionary
    Validate {
        file: PathBuf,
        /// Dictionary file, or a name looked up in the configured directories
        #[arg(long = "dict", value_name = "PATH|NAME")]
        dictionary: Option<String>,
        /// Reject the file on the first schema violation
        #[arg(long)]
        strict: bool,
    },
    /// Parse a file and write it back out
    Rewrite {
        file: PathBuf,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long = "dict", value_name = "PATH|NAME")]
        dictionary: Option<String>,
        /// Order the rows of keyed categories by key
        #[arg(long)]
        sort: bool,
    },
    /// Print the rows of a category that match all filters
    Query {
        file: PathBuf,
        category: String,
        /// Exact match, as item=value
        #[arg(long = "where", value_name = "ITEM=VALUE")]
        filters: Vec<String>,
        /// Regular expression match, as item=pattern
        #[arg(long = "matches", value_name = "ITEM=REGEX")]
        patterns: Vec<String>,
    },
    /// List the blocks and categories of a file
    Summary { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match Config::load() {
        Ok(Some(config)) => config,
        Ok(None) => Config::default(),
        Err(e) => {
            log::warn!("ignoring config file: {e}");
            Config::default()
        }
    };

    match cli.command {
        Command::Validate {
            file,
            dictionary,
            strict,
        } => validate(&config, &file, dictionary.as_deref(), strict),
        Command::Rewrite {
            file,
            output,
            dictionary,
            sort,
        } => rewrite(&config, &file, output.as_deref(), dictionary.as_deref(), sort),
        Command::Query {
            file,
            category,
            filters,
            patterns,
        } => query(&file, &category, &filters, &patterns),
        Command::Summary { file } => summary(&file),
    }
}

/// Find the dictionary to use: an existing path, a name in the configured
/// directories, or the configured default.
fn resolve_dictionary(config: &Config, requested: Option<&str>) -> Result<Option<PathBuf>> {
    let Some(requested) = requested else {
        return Ok(config.default_dictionary_path()?);
    };

    let path = Path::new(requested);
    if path.is_file() {
        return Ok(Some(path.to_path_buf()));
    }
    match config.find_dictionary(requested)? {
        Some(path) => Ok(Some(path)),
        None => bail!("dictionary '{requested}' not found"),
    }
}

fn load_dictionary(config: &Config, requested: Option<&str>) -> Result<Option<Arc<Dictionary>>> {
    let Some(path) = resolve_dictionary(config, requested)? else {
        return Ok(None);
    };
    let dictionary = io::read_dictionary(&path)
        .with_context(|| format!("Failed to load dictionary {}", path.display()))?;
    Ok(Some(Arc::new(dictionary)))
}

fn read_document(file: &Path) -> Result<Document> {
    io::read_document(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn validate(
    config: &Config,
    file: &Path,
    dictionary: Option<&str>,
    strict: bool,
) -> Result<ExitCode> {
    let Some(dictionary) = load_dictionary(config, dictionary)? else {
        bail!("no dictionary given and no default dictionary configured");
    };

    let mut document = read_document(file)?;
    if strict || config.strict {
        document.set_options(ValidationOptions::strict());
    }
    let report = document.set_dictionary(dictionary);

    let mut out = stdout().lock();
    for violation in &report {
        writeln!(out, "{violation}")?;
    }
    if report.is_valid() {
        writeln!(out, "{}: valid", file.display())?;
        Ok(ExitCode::SUCCESS)
    } else {
        writeln!(
            out,
            "{}: {} violation(s)",
            file.display(),
            report.len()
        )?;
        Ok(ExitCode::FAILURE)
    }
}

fn write_options(config: &Config) -> WriteOptions {
    WriteOptions {
        line_width: config.writer.line_width,
        canonical_order: config.writer.canonical_order,
        ..WriteOptions::default()
    }
}

fn rewrite(
    config: &Config,
    file: &Path,
    output: Option<&Path>,
    dictionary: Option<&str>,
    sort: bool,
) -> Result<ExitCode> {
    let mut document = read_document(file)?;
    if let Some(dictionary) = load_dictionary(config, dictionary)? {
        let report = document.set_dictionary(dictionary);
        for violation in &report {
            log::warn!("{violation}");
        }
    }

    if sort {
        for block in document.blocks_mut() {
            for category in block.categories_mut() {
                category.reorder_by_index();
            }
        }
    }

    let options = write_options(config);
    match output {
        Some(path) => io::write_document(path, &document, &options)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => stdout().lock().write_all(document.to_cif(&options).as_bytes())?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Split `item=value`.
fn parse_assignment(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((item, value)) if !item.is_empty() => Ok((item, value)),
        _ => bail!("expected ITEM=VALUE, got '{arg}'"),
    }
}

fn build_condition(filters: &[String], patterns: &[String]) -> Result<Condition> {
    let mut condition = all();
    for filter in filters {
        let (item, value) = parse_assignment(filter)?;
        condition = condition & key(item).eq(value);
    }
    for pattern in patterns {
        let (item, regex) = parse_assignment(pattern)?;
        let regex = Regex::new(regex).with_context(|| format!("Invalid pattern for {item}"))?;
        condition = condition & key(item).matches(regex);
    }
    Ok(condition)
}

fn query(file: &Path, category: &str, filters: &[String], patterns: &[String]) -> Result<ExitCode> {
    let document = read_document(file)?;
    let condition = build_condition(filters, patterns)?;
    let category = category.trim_start_matches('_');

    let mut out = stdout().lock();
    let mut matched = 0;
    for block in document.blocks() {
        let Some(cat) = block.category(category) else {
            continue;
        };
        let rows = cat.find(&condition);
        if rows.is_empty() {
            continue;
        }
        matched += rows.len();

        writeln!(out, "data_{}", block.name())?;
        writeln!(out, "{}", cat.column_names().collect::<Vec<_>>().join("\t"))?;
        for row in rows.rows(cat) {
            let values: Vec<&str> = cat.column_names().map(|item| row.get(item)).collect();
            writeln!(out, "{}", values.join("\t"))?;
        }
    }

    log::info!("{matched} matching row(s)");
    Ok(if matched > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn summary(file: &Path) -> Result<ExitCode> {
    let document = read_document(file)?;
    let mut out = stdout().lock();
    for block in document.blocks() {
        writeln!(out, "data_{} ({} categories)", block.name(), block.len())?;
        for category in block.categories() {
            writeln!(
                out,
                "  {:<32} {:>8} row(s) {:>4} item(s)",
                category.name(),
                category.len(),
                category.columns().len()
            )?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    const DATA: &str = "data_x\nloop_\n_atom.id\n_atom.name\n1 N\n2 CA\n3 CB\n";

    #[rstest]
    #[case("id=1", ("id", "1"))]
    #[case("name=", ("name", ""))]
    #[case("a=b=c", ("a", "b=c"))]
    fn assignments(#[case] arg: &str, #[case] expected: (&str, &str)) {
        assert_eq!(parse_assignment(arg).unwrap(), expected);
    }

    #[rstest]
    #[case("id")]
    #[case("=1")]
    fn bad_assignments(#[case] arg: &str) {
        assert!(parse_assignment(arg).is_err());
    }

    #[test]
    fn conditions_combine_filters_and_patterns() {
        let doc = Document::parse(DATA).unwrap();
        let atoms = doc.first_block().unwrap().category("atom").unwrap();

        let condition = build_condition(&[], &["name=^C".to_string()]).unwrap();
        assert_eq!(atoms.count(&condition), 2);

        let condition =
            build_condition(&["id=3".to_string()], &["name=^C".to_string()]).unwrap();
        let names: Vec<_> = atoms
            .find(&condition)
            .rows(atoms)
            .map(|r| r.get("name").to_string())
            .collect();
        assert_eq!(names, vec!["CB"]);

        assert_eq!(atoms.count(&build_condition(&[], &[]).unwrap()), 3);
        assert!(build_condition(&[], &["name=(".to_string()]).is_err());
    }

    #[test]
    fn dictionaries_resolve_by_path_or_name() {
        let dir = TempDir::new().unwrap();
        let dic = dir.path().join("core.dic");
        std::fs::write(&dic, "data_core\n").unwrap();

        let mut config = Config {
            dictionary_dirs: vec![dir.path().to_path_buf()],
            ..Config::default()
        };

        let by_path = resolve_dictionary(&config, dic.to_str()).unwrap();
        assert_eq!(by_path, Some(dic.clone()));
        assert_eq!(resolve_dictionary(&config, Some("core")).unwrap(), Some(dic.clone()));
        assert!(resolve_dictionary(&config, Some("missing")).is_err());

        assert_eq!(resolve_dictionary(&config, None).unwrap(), None);
        config.default_dictionary = Some("core".to_string());
        assert_eq!(resolve_dictionary(&config, None).unwrap(), Some(dic));
    }

    #[test]
    fn write_options_follow_the_config() {
        let mut config = Config::default();
        config.writer.line_width = 80;
        config.writer.canonical_order = false;

        let options = write_options(&config);
        assert_eq!(options.line_width, 80);
        assert!(!options.canonical_order);
        assert!(options.audit_conform);
    }

    #[test]
    fn cli_arguments() {
        let cli = Cli::try_parse_from([
            "cifkit", "-vv", "query", "x.cif", "atom", "--where", "id=1", "--matches", "name=^C",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Query {
                category,
                filters,
                patterns,
                ..
            } => {
                assert_eq!(category, "atom");
                assert_eq!(filters, vec!["id=1"]);
                assert_eq!(patterns, vec!["name=^C"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
