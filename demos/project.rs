//! Projects one annotated file onto one configuration.
//!
//! ```text
//! cargo run --example project -- --spl spl --file src/main.c \
//!     --annotation 2:9:F --annotation 4:6:"F && G" --set F=1 --set G=0 --target out
//! ```

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;

use spl_sim::artefact::{Annotation, AnnotationStyle, ArtefactTree, SourceCodeFile};
use spl_sim::bdd::BddOracle;
use spl_sim::config::{Configuration, Variant};
use spl_sim::formula::Formula;
use spl_sim::options::VariantGenerationOptions;
use spl_sim::pretty::PrettyPrinter;
use spl_sim::projector::project_file;

#[derive(Parser)]
#[command(author, version, about = "Project an annotated SPL file onto a configuration")]
struct Cli {
    /// Root of the SPL working tree
    #[arg(long, value_name = "DIR")]
    spl: PathBuf,

    /// File to project, relative to the SPL root
    #[arg(short, long, value_name = "PATH")]
    file: PathBuf,

    /// Preprocessor block as FROM:TO:FORMULA, marker lines included
    #[arg(short, long = "annotation", value_name = "BLOCK")]
    annotations: Vec<String>,

    /// Feature assignment as FEATURE=BOOL
    #[arg(short, long = "set", value_name = "ASSIGNMENT")]
    assignments: Vec<String>,

    /// Keep the #if/#endif lines in the output
    #[arg(long)]
    with_macros: bool,

    /// Where the variant is written
    #[arg(short, long, value_name = "DIR")]
    target: PathBuf,
}

fn parse_annotation(block: &str) -> Result<Annotation> {
    let mut parts = block.splitn(3, ':');
    let (Some(from), Some(to), Some(formula)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("annotation `{}` is not FROM:TO:FORMULA", block);
    };
    let condition = Formula::parse(formula)?;
    Ok(Annotation::new(condition, from.trim().parse()?, to.trim().parse()?, AnnotationStyle::Internal)?)
}

/// Nests annotations by containment under a root spanning `lines` lines.
fn build_root(mut annotations: Vec<Annotation>, lines: usize) -> Result<Annotation> {
    annotations.sort_by_key(|a| (a.from(), std::cmp::Reverse(a.to())));

    let mut stack = vec![Annotation::new(Formula::True, 1, lines, AnnotationStyle::External)?];
    for annotation in annotations {
        while let Some(top) = stack.last() {
            if stack.len() == 1 || top.range().encloses(&annotation.range()) {
                break;
            }
            let done = stack.pop().ok_or_else(|| eyre!("empty nesting stack"))?;
            stack.last_mut().ok_or_else(|| eyre!("empty nesting stack"))?.add_child(done)?;
        }
        stack.push(annotation);
    }
    while stack.len() > 1 {
        let done = stack.pop().ok_or_else(|| eyre!("empty nesting stack"))?;
        stack.last_mut().ok_or_else(|| eyre!("empty nesting stack"))?.add_child(done)?;
    }
    stack.pop().ok_or_else(|| eyre!("empty nesting stack"))
}

fn main() -> Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let cli = Cli::parse();

    let source = std::fs::read_to_string(cli.spl.join(&cli.file))?;
    let lines = source.split_inclusive('\n').count();

    let annotations = cli
        .annotations
        .iter()
        .map(|block| parse_annotation(block))
        .collect::<Result<Vec<_>>>()?;
    let root = build_root(annotations, lines)?;
    let file = SourceCodeFile::new(&cli.file, Formula::True, root);

    let oracle = BddOracle::default();
    file.check_consistency(&oracle)?;
    let tree: ArtefactTree = file.clone().into();
    println!("SPL:");
    print!("{}", PrettyPrinter::default().print(&tree));

    let configuration: Configuration = cli.assignments.join(",").parse()?;
    println!("configuration = {}", configuration);
    let variant = Variant::new("demo", configuration);

    let options = VariantGenerationOptions::default().with_macros(cli.with_macros);
    let Some(truth) = project_file(&file, &variant, &cli.spl, &cli.target, &options)? else {
        println!("{} is not part of this variant", cli.file.display());
        return Ok(());
    };

    println!("variant:");
    print!("{}", PrettyPrinter::default().print(&truth.artefact));

    let matches = truth
        .get(&cli.file)
        .ok_or_else(|| eyre!("no ground truth for {}", cli.file.display()))?;
    println!("block matching:");
    for (spl, variant) in matches.matching.pairs() {
        println!("- {} -> {}", spl, variant);
    }
    for (id, annotation) in matches.spl_artefact.root().preorder() {
        if !matches.is_present_in_variant(id) {
            println!("- {} {} `{}` removed", id, annotation.range(), annotation.condition());
        }
    }
    println!("written to {}", cli.target.join(&cli.file).display());

    Ok(())
}
