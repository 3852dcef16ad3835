use dotenv::dotenv;
use meal_map_reconciler::*;
use std::env;
use std::fs;

/// Usage: `ingest_month <lot> <unit> <month> <year> [meals.txt] [siisp.txt]`
///
/// Without a meal file a synthetic month is ingested.
fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let lot_id: u32 = args.first().map(|s| s.parse()).transpose()?.unwrap_or(1);
    let unit_name = args.get(1).cloned().unwrap_or_else(|| "CPP Norte".to_string());
    let month: u32 = args.get(2).map(|s| s.parse()).transpose()?.unwrap_or(3);
    let year: i32 = args.get(3).map(|s| s.parse()).transpose()?.unwrap_or(2025);

    let days = days_in_month(month, year)?;
    let meal_text = match args.get(4) {
        Some(path) => fs::read_to_string(path)?,
        None => (1..=days)
            .map(|day| format!("{:02}\t120\t8\t125\t9\t118\t7\t122\t8", day))
            .collect::<Vec<_>>()
            .join("\n"),
    };
    let siisp_text = match args.get(5) {
        Some(path) => fs::read_to_string(path)?,
        None => vec!["118"; days].join("\n"),
    };

    let config = StoreConfig::from_env();
    println!("Data directory: {}", config.data_dir.display());

    let reconciler = Reconciler::new(JsonFileStore::from_config(&config));
    let submission = Submission {
        lot_id,
        month,
        year,
        unit_name,
        meal_text,
        siisp_text: None,
    };

    let outcome = match reconciler.ingest(&submission) {
        Ok(outcome) => outcome,
        Err(e) => {
            match e.rejection() {
                Some(rejection) => println!("{}", serde_json::to_string_pretty(&rejection)?),
                None => eprintln!("Ingestion failed: {}", e),
            }
            return Ok(());
        }
    };

    println!(
        "{} map {} for {} {:02}/{}",
        if outcome.replaced { "Replaced" } else { "Created" },
        outcome.record.id,
        outcome.record.unit_name,
        month,
        year
    );
    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);

    let identity = submission.identity();
    let record = match reconciler.attach_siisp(&identity, &siisp_text) {
        Ok(record) => record,
        Err(e) => {
            match e.rejection() {
                Some(rejection) => println!("{}", serde_json::to_string_pretty(&rejection)?),
                None => eprintln!("Attaching SIISP failed: {}", e),
            }
            return Ok(());
        }
    };
    println!(
        "SIISP attached; lunch (internal) deviations: {:?}",
        record.deviations.lunch_internal
    );

    let catalog = Catalog::load(&config)?;
    match lot_summary(&catalog, reconciler.store(), lot_id, PeriodFilter::default()) {
        Ok(summary) => {
            println!("Lot {} over {} months:", lot_id, summary.months_on_record);
            println!("  meals/month:     {}", summary.meals_per_month);
            println!("  cost/month:      {:.2}", summary.cost_per_month);
            println!("  deviation/month: {:.2}", summary.deviation_per_month);
            println!("  conformity:      {}", summary.conformity);
        }
        Err(MealMapError::LotNotFound(id)) => {
            println!("Lot {} is not in {}; skipping summary", id, config.lots_path().display());
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
