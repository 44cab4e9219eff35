use std::path::Path;

use freqct_core::CtableError;

pub fn run(dataset_path: &str, host: &str, port: u16) -> Result<(), CtableError> {
    let dataset = freqct_server::load_dataset(Path::new(dataset_path))?;
    let base = format!("http://{host}:{port}");

    println!("freqct reference server v{}", freqct_core::VERSION);
    println!("   {base}");
    println!("   {} table(s) from {dataset_path}", dataset.tables.len());
    for table in &dataset.tables {
        println!("     {} x {} ({} rows)", table.attr1, table.attr2, table.rows.len());
    }
    println!();
    println!("   Endpoints:");
    println!("     GET  /                API index (try: curl {base})");
    println!("     GET  /freqct          Contingency table of two attributes");
    println!("     POST /export_freqct   Convert an export payload to CSV");
    println!("     GET  /health          Health check");
    println!();
    if let Some(table) = dataset.tables.first() {
        println!("   Example:");
        println!(
            "     curl '{base}/freqct?ctattr1={}&ctattr2={}&ctminfreq=1&ctminfreq_type=abs'",
            table.attr1, table.attr2
        );
        println!();
    }

    super::runtime()?.block_on(freqct_server::run_server(dataset, host, port))?;
    Ok(())
}
