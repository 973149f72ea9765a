use clap::Args;

use crate::acquire::session::{acquire_window_id, Credentials};
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct SessionArgs {
    /// County portal username (optional; improves extraction success)
    #[arg(long, requires = "password")]
    pub username: Option<String>,

    /// County portal password
    #[arg(long, requires = "username")]
    pub password: Option<String>,

    /// windowId to fall back to when extraction fails
    #[arg(long)]
    pub fallback: Option<String>,
}

pub fn run(args: SessionArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let credentials = match (&args.username, &args.password) {
        (Some(username), Some(password)) => Some(Credentials {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    };

    if verbose {
        eprintln!(
            "Extracting windowId ({})",
            if credentials.is_some() {
                "with credentials"
            } else {
                "unauthenticated"
            }
        );
    }

    let Some(window_id) = acquire_window_id(credentials.as_ref(), args.fallback.as_deref()) else {
        anyhow::bail!(
            "could not acquire a windowId; pass --fallback, or copy one from a county property page URL"
        );
    };

    match format {
        OutputFormat::Text | OutputFormat::Tsv => println!("{window_id}"),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "window_id": window_id })
        ),
    }

    Ok(())
}
