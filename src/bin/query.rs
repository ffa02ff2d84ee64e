use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use env_logger::Env;
use kinship::db::Db;
use kinship::graph::{DepthMode, GenderCode, MatchQuery, PersonId, RelativesQuery};
use kinship::{Config, KinshipService};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Run kinship graph queries against the database and print JSON")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// How two persons are connected
    Path {
        person_a: PersonId,
        person_b: PersonId,
    },
    /// Relatives within a number of hops
    Relatives {
        person_id: PersonId,
        #[arg(short, long, default_value_t = 1)]
        depth: usize,
        /// up_to or only_at
        #[arg(long, default_value = "up_to")]
        mode: DepthMode,
        #[arg(long)]
        living_only: bool,
        #[arg(long)]
        gender_id: Option<i64>,
        #[command(flatten)]
        address: AddressFilter,
    },
    /// Eligible partners in the extended family network
    Matches {
        person_id: PersonId,
        /// MALE, FEMALE or UNKNOWN (case-insensitive)
        #[arg(short, long)]
        gender: GenderCode,
        #[arg(short, long, default_value_t = 2)]
        depth: usize,
        #[arg(long)]
        birth_year_min: Option<i32>,
        #[arg(long)]
        birth_year_max: Option<i32>,
        #[arg(long)]
        religion_id: Option<i64>,
        #[arg(long)]
        religion_category_id: Option<i64>,
        #[arg(long)]
        religion_sub_category_id: Option<i64>,
        /// Sub-category to exclude; repeatable
        #[arg(long = "exclude-sub-category")]
        exclude_sub_category_ids: Vec<i64>,
    },
    /// Probable relatives not yet linked
    Suggestions { person_id: PersonId },
}

#[derive(ClapArgs, Debug)]
struct AddressFilter {
    #[arg(long)]
    country_id: Option<i64>,
    #[arg(long)]
    state_id: Option<i64>,
    #[arg(long)]
    district_id: Option<i64>,
    #[arg(long)]
    city_id: Option<i64>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Keep stdout clean for the JSON output.
    env_logger::Builder::from_env(Env::default().filter_or("RUST_LOG", "warn")).init();

    let args = Args::parse();
    let config = Config::load()?;

    if !config.db_path().exists() {
        anyhow::bail!(
            "Database not found at {}. Import a dataset with `load` first.",
            config.db_path().display()
        );
    }
    let service = KinshipService::new(Db::new(config.db_path()), config.traversal.clone());

    match args.command {
        Command::Path { person_a, person_b } => {
            print_json(&service.find_path(person_a, person_b).await?)?;
        }
        Command::Relatives { person_id, depth, mode, living_only, gender_id, address } => {
            let query = RelativesQuery {
                living_only,
                gender_id,
                country_id: address.country_id,
                state_id: address.state_id,
                district_id: address.district_id,
                city_id: address.city_id,
                ..RelativesQuery::new(depth, mode)
            };
            print_json(&service.relatives(person_id, query).await?)?;
        }
        Command::Matches {
            person_id,
            gender,
            depth,
            birth_year_min,
            birth_year_max,
            religion_id,
            religion_category_id,
            religion_sub_category_id,
            exclude_sub_category_ids,
        } => {
            let query = MatchQuery {
                birth_year_min,
                birth_year_max,
                religion_id,
                religion_category_id,
                religion_sub_category_id,
                exclude_sub_category_ids,
                ..MatchQuery::new(gender, depth)
            };
            print_json(&service.matches(person_id, query).await?)?;
        }
        Command::Suggestions { person_id } => {
            print_json(&service.suggestions(person_id).await?)?;
        }
    }

    Ok(())
}
