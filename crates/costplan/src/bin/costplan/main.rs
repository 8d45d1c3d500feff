mod cli;

use costplan::block::Block;
use costplan::config_documents::ConfigDocuments;
use costplan::evaluator::{Evaluator, EvaluatorOptions};
use costplan::record::ResourceRecord;
use hcl::eval::Evaluate;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("COSTPLAN_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Resources(resources_cli) => resources(resources_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn resources(cli: cli::ResourcesCommand) -> anyhow::Result<()> {
    let documents = load(&cli.input)?;

    let mut options = EvaluatorOptions::new();
    options.max_module_depth = cli.max_module_depth;
    options.max_count = cli.max_count;
    options.inputs = variables(&cli.variables)?;

    let records = Evaluator::new(options).evaluate(&documents)?;

    output(&cli.output, &records)?;
    Ok(())
}

fn load(input: &cli::InputArgs) -> anyhow::Result<ConfigDocuments> {
    let mut documents = ConfigDocuments::default();

    if !input.workdir && input.files.is_empty() && input.directories.is_empty() {
        let stdin = std::io::read_to_string(std::io::stdin())?;
        let body = hcl_edit::parser::parse_body(&stdin)?;
        documents.insert(body.into(), None)?;
        return Ok(documents);
    }

    if input.workdir {
        documents.load_directory(&std::env::current_dir()?)?;
    }

    for file_path in &input.files {
        documents.load_file(file_path)?;
    }

    for dir_path in &input.directories {
        documents.load_directory(dir_path)?;
    }

    anyhow::ensure!(documents.source_count() > 0, "No files loaded");

    Ok(documents)
}

/// Root module variables, `--var` wins over `--var-file`
fn variables(args: &cli::VariableArgs) -> anyhow::Result<hcl::value::Map<String, hcl::Value>> {
    let context = hcl::eval::Context::new();
    let mut inputs = hcl::value::Map::new();

    for var_file in &args.var_files {
        let contents = std::fs::read_to_string(var_file)?;
        let body: hcl::Body = hcl_edit::parser::parse_body(&contents)?.into();
        for attribute in body.into_attributes() {
            let value = attribute.expr.evaluate(&context).map_err(|error| {
                anyhow::anyhow!("{}: {} {error}", var_file.display(), attribute.key)
            })?;
            inputs.insert(attribute.key.to_string(), value);
        }
    }

    for var in &args.vars {
        let Some((name, raw)) = var.split_once('=') else {
            anyhow::bail!("Invalid --var {var:?}, expected name=value");
        };

        let value = raw
            .parse::<hcl_edit::expr::Expression>()
            .ok()
            .map(hcl::Expression::from)
            .and_then(|expr| expr.evaluate(&context).ok())
            .unwrap_or_else(|| hcl::Value::String(raw.to_string()));
        inputs.insert(name.trim().to_string(), value);
    }

    Ok(inputs)
}

fn output(output: &cli::OutputArgs, records: &[ResourceRecord]) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), records)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), records)?,
    };

    Ok(())
}

/// developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    let mut documents = ConfigDocuments::default();
    documents.load_directory(&std::env::current_dir()?)?;

    match cli.command {
        Documents => println!("{documents:#?}"),
        Blocks => {
            let context = costplan::context::Context::new();
            for block in documents.blocks(&context, None) {
                print_block(&block, 0);
            }
        }
    }

    Ok(())
}

fn print_block(block: &Block, depth: usize) {
    let attributes: Vec<_> = block
        .attributes()
        .into_iter()
        .map(|attribute| attribute.name().to_string())
        .collect();
    println!(
        "{:indent$}{} {:?}",
        "",
        block.full_name(),
        attributes,
        indent = depth * 2
    );

    for child in block.children() {
        print_block(child, depth + 1);
    }
}
