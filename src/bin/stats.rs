use xmlshred::{config::Config, db::migrate, db::Db, query, registry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.store.log_level)).init();

    let db = Db::new(config.db_path()).with_busy_timeout(config.busy_timeout());
    db.with_connection(|conn| migrate::run_migrations(conn)).await?;

    let stats = query::store_stats(&db).await?;

    println!("\n=== xmlshred Store Statistics ===\n");
    println!("Database: {}", config.db_path().display());
    println!("  Files:      {}", stats.files);
    println!("  Tags:       {}", stats.tags);
    println!("  Attributes: {}", stats.attributes);

    if stats.files == 0 {
        println!("\nNo files ingested yet.");
        return Ok(());
    }

    let mut files = registry::files(&db).await?;
    files.sort_by(|a, b| b.tag_count.cmp(&a.tag_count).then_with(|| a.name.cmp(&b.name)));

    println!("\nLargest files by element count:\n");
    println!("{:-<60}", "");
    println!("{:<8} {:<36} {:>12}", "Id", "Name", "Tags");
    println!("{:-<60}", "");
    for file in files.iter().take(20) {
        println!("{:<8} {:<36} {:>12}", file.id, file.name, file.tag_count);
    }
    println!("{:-<60}", "");

    let average = stats.tags as f64 / stats.files as f64;
    println!("\nAverage tags per file: {:.1}", average);
    println!();

    Ok(())
}
