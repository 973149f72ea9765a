use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::acquire::photo::{PhotoFetcher, PhotoTarget, DEFAULT_FETCH_DELAY};
use crate::cli::OutputFormat;
use crate::parsing;

#[derive(Args)]
pub struct PhotosArgs {
    /// Result spreadsheet with Parcel_ID, Address, City, State, Zip columns
    #[arg(required = true)]
    pub input: PathBuf,

    /// Folder to save photos into
    #[arg(long, default_value = "zillow_photos")]
    pub output_dir: PathBuf,

    /// Seconds to wait between downloads
    #[arg(long, default_value_t = DEFAULT_FETCH_DELAY.as_secs())]
    pub delay: u64,
}

pub fn run(args: PhotosArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let dataset = parsing::load_dataset(&args.input)?;

    let targets: Vec<PhotoTarget> = (0..dataset.len())
        .filter_map(|row| {
            let parcel_id = dataset.value(row, "Parcel_ID")?.display();
            if parcel_id.is_empty() {
                return None;
            }
            let field = |col: &str| {
                dataset
                    .value(row, col)
                    .map(crate::core::value::FieldValue::display)
                    .unwrap_or_default()
            };
            Some(PhotoTarget {
                parcel_id,
                address: field("Address"),
                city: field("City"),
                state: field("State"),
                zip: field("Zip"),
            })
        })
        .collect();

    if targets.is_empty() {
        anyhow::bail!(
            "no rows with a Parcel_ID found in {} - is this a result spreadsheet?",
            args.input.display()
        );
    }

    if verbose {
        eprintln!(
            "Fetching {} photos into {} ({}s delay)",
            targets.len(),
            args.output_dir.display(),
            args.delay
        );
    }

    let fetcher = PhotoFetcher::new(&args.output_dir, Duration::from_secs(args.delay))?;
    let photos = fetcher.fetch_batch(&targets);

    match format {
        OutputFormat::Text => {
            println!("Downloaded {} of {} photos", photos.len(), targets.len());
            println!("Photos saved in: {}", args.output_dir.display());
        }
        OutputFormat::Json => {
            let map: std::collections::BTreeMap<&String, String> = photos
                .iter()
                .map(|(parcel, path)| (parcel, path.display().to_string()))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "requested": targets.len(),
                    "downloaded": photos.len(),
                    "photos": map,
                }))?
            );
        }
        OutputFormat::Tsv => {
            println!("parcel_id\tpath");
            let mut entries: Vec<_> = photos.iter().collect();
            entries.sort_by_key(|(parcel, _)| (*parcel).clone());
            for (parcel, path) in entries {
                println!("{parcel}\t{}", path.display());
            }
        }
    }

    Ok(())
}
