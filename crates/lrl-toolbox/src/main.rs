//! `lrl` - CLI for lrl-toolbox
//!
//! This binary exposes the preprocessing transformers over CSV files and the
//! file tree store over data files on disk.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;

use lrl_toolbox::cli::{
    CircularCommand, Cli, Command, ConfigCommand, InsertCommand, TreeCommand, WinsorizeCommand,
};
use lrl_toolbox::{
    init_logging, CircularTransformer, Config, DataFormat, LocalFileTree, Matrix, NanPolicy,
    Transformer, TreeDataEntry, TreeOptions, Winsorizer,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;
    let root = cli.root.clone().unwrap_or_else(|| config.tree_root());

    match cli.command {
        Command::Tree(tree_cmd) => handle_tree(&config, &root, tree_cmd),
        Command::Winsorize(cmd) => handle_winsorize(&config, &cmd),
        Command::Circular(cmd) => handle_circular(&config, &cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_tree(config: &Config, root: &Path, cmd: TreeCommand) -> anyhow::Result<()> {
    match cmd {
        TreeCommand::Init {
            leaf_depth,
            tree_depth,
            format,
            no_metadata,
        } => {
            let mut layout = config.layout();
            if let Some(leaf_depth) = leaf_depth {
                layout.leaf_depth = leaf_depth;
            }
            if let Some(tree_depth) = tree_depth {
                layout.tree_depth = tree_depth;
            }
            if let Some(format) = format {
                layout.file_format = format.into();
            }
            if no_metadata {
                layout.has_metadata = false;
            }
            let tree = open_tree(root, TreeOptions::with_layout(layout))?;
            println!("File tree at {}", tree.root().display());
            println!("{}", serde_json::to_string_pretty(&tree.config()?)?);
        }
        TreeCommand::Info { json } => {
            let tree = open_tree(root, TreeOptions::readonly())?;
            let layout = tree.config()?;
            if json {
                let info = serde_json::json!({
                    "root": tree.root(),
                    "config": layout,
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("lrl file tree");
                println!("-------------");
                println!("Root:          {}", tree.root().display());
                println!("Entries:       {}", layout.file_count);
                println!("Tree depth:    {}", layout.tree_depth);
                println!("Leaf depth:    {}", layout.leaf_depth);
                println!("Leaf capacity: {}", layout.leaf_capacity());
                println!("Format:        {}", layout.file_format);
                println!("Metadata:      {}", layout.has_metadata);
            }
        }
        TreeCommand::Insert(insert_cmd) => handle_insert(config, root, &insert_cmd)?,
        TreeCommand::Get { index, output } => {
            let tree = open_tree(root, TreeOptions::readonly())?;
            let entry = tree
                .get(index)
                .with_context(|| format!("reading entry {index}"))?;
            match output {
                Some(path) => {
                    let format = format_for(&path)?;
                    let written = entry.write_data(&path, format)?;
                    println!("Wrote entry {index} to {}", written.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&entry)?),
            }
        }
        TreeCommand::List { start, stop, step } => {
            let tree = open_tree(root, TreeOptions::readonly())?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for entry in tree.range(start, stop, step)? {
                writeln!(out, "{}", serde_json::to_string(&entry?)?)?;
            }
        }
    }
    Ok(())
}

fn handle_insert(config: &Config, root: &Path, cmd: &InsertCommand) -> anyhow::Result<()> {
    let metadata = match &cmd.metadata {
        Some(raw) => match serde_json::from_str(raw).context("parsing --metadata")? {
            serde_json::Value::Object(map) => Some(map),
            _ => bail!("--metadata must be a JSON object"),
        },
        None => None,
    };

    let entries = cmd
        .files
        .iter()
        .map(|path| {
            let entry = TreeDataEntry::load(path, None)
                .with_context(|| format!("loading {}", path.display()))?;
            Ok(match &metadata {
                Some(map) => entry.with_metadata(map.clone()),
                None => entry,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let tree = open_tree(root, TreeOptions::with_layout(config.layout()))?;
    let range = tree.insert(&entries)?;
    println!(
        "Inserted {} entries at indices {}..{}",
        entries.len(),
        range.start,
        range.end
    );
    Ok(())
}

fn handle_winsorize(config: &Config, cmd: &WinsorizeCommand) -> anyhow::Result<()> {
    let (default_low, default_high) = config.quantile_range();
    let range = (
        cmd.low.unwrap_or(default_low),
        cmd.high.unwrap_or(default_high),
    );
    let mut winsorizer = Winsorizer::new(range, nan_policy(config, cmd.nan_policy));

    let input = read_matrix(&cmd.input)?;
    let output = winsorizer.fit_transform(&input)?;
    write_matrix(&output, cmd.output.as_ref())
}

fn handle_circular(config: &Config, cmd: &CircularCommand) -> anyhow::Result<()> {
    let mut transformer =
        CircularTransformer::new(cmd.period.clone(), nan_policy(config, cmd.nan_policy));

    let input = read_matrix(&cmd.input)?;
    let output = transformer.fit_transform(&input)?;
    write_matrix(&output, cmd.output.as_ref())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Tree]");
                println!("  Root:               {}", config.tree_root().display());
                println!("  Tree depth:         {}", config.tree.tree_depth);
                println!("  Leaf depth:         {}", config.tree.leaf_depth);
                println!("  File format:        {}", config.tree.file_format);
                println!("  Metadata:           {}", config.tree.has_metadata);
                println!();
                println!("[Preprocessing]");
                println!("  Winsor low:         {}", config.preprocessing.winsor_low);
                println!("  Winsor high:        {}", config.preprocessing.winsor_high);
                println!("  NaN policy:         {}", config.preprocessing.nan_policy);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn open_tree(root: &Path, options: TreeOptions) -> anyhow::Result<LocalFileTree> {
    LocalFileTree::open(root, options)
        .with_context(|| format!("opening file tree at {}", root.display()))
}

fn format_for(path: &Path) -> anyhow::Result<DataFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .with_context(|| format!("{} has no file extension", path.display()))?;
    Ok(DataFormat::from_extension(ext)?)
}

fn nan_policy(config: &Config, arg: Option<lrl_toolbox::cli::NanPolicyArg>) -> NanPolicy {
    arg.map_or(config.preprocessing.nan_policy, NanPolicy::from)
}

fn read_matrix(path: &Path) -> anyhow::Result<Matrix> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Matrix::from_csv_reader(BufReader::new(file))
        .with_context(|| format!("reading matrix from {}", path.display()))
}

fn write_matrix(matrix: &Matrix, output: Option<&PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            matrix.to_csv_writer(BufWriter::new(file))?;
        }
        None => matrix.to_csv_writer(io::stdout().lock())?,
    }
    Ok(())
}
