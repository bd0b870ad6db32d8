use std::env::args;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tankdecode::{Options, ProgressEvent, TankReader};

fn main() -> Result<()> {
    color_eyre::install().unwrap();
    let (block, options) = parse_args()?;

    let (handle, progress) = TankReader::new(options).spawn(&block);
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}/{len:3} stores",
        )
        .unwrap()
        .progress_chars("##-"),
    );
    for event in progress {
        match event {
            ProgressEvent::Update { processed, total } => {
                bar.set_length(total as u64);
                bar.set_position(processed as u64);
            }
            ProgressEvent::Complete => bar.finish(),
        }
    }

    let decoded = handle
        .join()
        .map_err(|_| eyre!("decode thread panicked"))?
        .wrap_err_with(|| format!("Could not decode {}", block.display()))?;

    let dataset = &decoded.dataset;
    println!(
        "block {} started {:?}",
        dataset.info.block_name, dataset.info.start_date
    );
    for (name, epochs) in &dataset.epochs {
        println!("epoch   {name}: {} intervals", epochs.len());
    }
    for (name, snippets) in &dataset.snippets {
        println!(
            "snippet {name}: {} waveforms ({})",
            snippets.len(),
            snippets.sort_name
        );
    }
    for (name, stream) in &dataset.streams {
        let samples: usize = stream
            .segments
            .iter()
            .flat_map(|s| s.data.first())
            .map(|d| d.len())
            .sum();
        println!(
            "stream  {name}: {} channels, {samples} samples per channel at {}Hz",
            stream.channels.len(),
            stream.sampling_frequency
        );
    }
    for (name, scalars) in &dataset.scalars {
        println!("scalar  {name}: {} values", scalars.timestamps.len());
    }
    for warning in &decoded.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

fn parse_args() -> Result<(PathBuf, Options)> {
    let mut args = args().skip(1);
    let block: PathBuf = args
        .next()
        .ok_or_else(|| eyre!("needs the path to a block, optionally followed by a ron options file"))?
        .into();
    let options = match args.next() {
        Some(path) => Options::load(Path::new(&path)).wrap_err("Could not load options")?,
        None => Options::default(),
    };
    Ok((block, options))
}
