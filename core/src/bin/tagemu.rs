use tagemu_core::{area::AreaManager, logging, Config, EmulationService};

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tagemu", version, about = "Manage a virtual tag collection")]
struct Args {
	/// Directory holding config.json, logs and flags
	#[arg(long, default_value = "tagemu-data")]
	data_dir: PathBuf,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Upgrade every tag stored in an older layout
	Scan,
	/// Print every valid tag in enumeration order
	List,
	/// Print a tag's data as JSON without activating it
	Show {
		/// Tag path, relative to the tag directory unless absolute
		path: PathBuf,
	},
	/// List the application areas stored for a tag
	Areas { path: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	let config = Config::load(&args.data_dir)?;
	logging::init(&args.data_dir, &config.log_filter)?;

	let service = EmulationService::new(config);
	info!(version = ?service.version(), tags_dir = ?service.tags_dir(), "Starting");

	match args.command {
		Command::Scan => {
			let stats = service.scan()?;
			println!(
				"{} tags found, {} migrated, {} skipped",
				stats.found, stats.migrated, stats.skipped
			);
		}
		Command::List => {
			service.reset_tag_iterator()?;
			while let Ok(tag) = service.next_tag() {
				println!("{}\t{}", tag.name(), tag.path().display());
			}
		}
		Command::Show { path } => {
			let source = service.try_parse_tag(path)?;
			println!("{}", serde_json::to_string_pretty(&source)?);
		}
		Command::Areas { path } => {
			let source = service.try_parse_tag(path)?;
			for id in AreaManager::new(&source.path).list()? {
				println!("0x{id:08X}");
			}
		}
	}

	Ok(())
}
