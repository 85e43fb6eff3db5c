//! CLI command implementations.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use esq::{CompileInput, Config, Error, FieldCatalog, LintResult};
use serde::Serialize;

/// Options for `lsq compile` beyond the input document.
pub struct CompileOptions {
    pub catalog: Option<PathBuf>,
    pub size: Option<u64>,
    pub lint: bool,
    pub compact: bool,
}

/// Exit code for a request that fails lint.
const LINT_FAILED_EXIT: i32 = 2;

/// Load the config from an explicit file or the default location.
fn load_config(config_path: Option<&Path>) -> esq::Result<Config> {
    match config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Resolve the catalog from a `--catalog` flag, falling back to the config.
fn load_catalog(flag: Option<&Path>, config: &Config) -> esq::Result<Option<FieldCatalog>> {
    let Some(path) = flag.or(config.catalog.as_deref()) else {
        return Ok(None);
    };
    FieldCatalog::load(path).map(Some)
}

/// Read a document from a file, or from stdin when no file is given.
fn read_input(file: Option<&Path>) -> esq::Result<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> esq::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}

pub fn compile(config_path: Option<&Path>, file: Option<&Path>, opts: &CompileOptions) -> esq::Result<()> {
    let config = load_config(config_path)?;
    let catalog = load_catalog(opts.catalog.as_deref(), &config)?;

    let mut input: CompileInput = serde_json::from_str(&read_input(file)?)?;
    if input.size.is_none() {
        input.size = Some(opts.size.unwrap_or(config.default_size));
    }
    tracing::debug!(
        conditions = input.conditions.len(),
        catalog = catalog.is_some(),
        "compiling input"
    );

    let request = esq::compile(&input, catalog.as_ref());
    print_json(&request, config.pretty && !opts.compact)?;

    if opts.lint && config.lint_on_compile {
        let result = esq::lint_request(&request, catalog.as_ref());
        for message in &result.messages {
            eprintln!("{}", message);
        }
    }

    Ok(())
}

pub fn lint(config_path: Option<&Path>, file: Option<&Path>, catalog: Option<&Path>, strict: bool) -> esq::Result<()> {
    let config = load_config(config_path)?;
    let catalog = load_catalog(catalog, &config)?;

    let request: serde_json::Value = serde_json::from_str(&read_input(file)?)?;
    let result = esq::lint(&request, catalog.as_ref());
    print_json(&result, config.pretty)?;

    if lint_failed(&result, strict || config.strict) {
        std::process::exit(LINT_FAILED_EXIT);
    }
    Ok(())
}

fn lint_failed(result: &LintResult, strict: bool) -> bool {
    !result.ok || (strict && result.has_warnings())
}

pub fn catalog_list(config_path: Option<&Path>, catalog: Option<&Path>, pattern: Option<&str>) -> esq::Result<()> {
    let config = load_config(config_path)?;
    let catalog = load_catalog(catalog, &config)?.ok_or_else(|| {
        Error::Catalog("no catalog given; pass --catalog or set `catalog` in the config".to_string())
    })?;

    let fields = match pattern {
        Some(pattern) => catalog.matching(pattern),
        None => catalog.iter().collect(),
    };

    if fields.is_empty() {
        if pattern.is_some() {
            println!("No fields matching pattern.");
        } else {
            println!("Catalog is empty.");
        }
        return Ok(());
    }

    println!("{:<32} {:<14} {:<32} NESTED", "FIELD", "TYPE", "EXACT");
    println!("{}", "-".repeat(90));
    for info in fields {
        println!(
            "{:<32} {:<14} {:<32} {}",
            info.name,
            info.field_type,
            info.exact_field(),
            info.nested_path().unwrap_or("-")
        );
    }

    Ok(())
}

pub fn catalog_import(mapping: &Path, output: Option<&Path>) -> esq::Result<()> {
    let document: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(mapping)?)?;
    let catalog = FieldCatalog::from_mapping(&document)?;
    let rendered = catalog.to_json_string_pretty()?;

    match output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", rendered))?;
            println!("Wrote {} fields to {}", catalog.len(), path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

pub fn config_show(config_path: Option<&Path>) -> esq::Result<()> {
    let config = load_config(config_path)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn config_init(config_path: Option<&Path>, force: bool) -> esq::Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?,
    };

    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    Config::default().save(&path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
