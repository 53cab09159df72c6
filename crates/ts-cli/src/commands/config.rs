use ts_simulation::SimConfig;

pub fn run() -> Result<(), String> {
    let json = serde_json::to_string_pretty(&SimConfig::default())
        .map_err(|e| format!("JSON serialization error: {e}"))?;
    println!("{json}");
    Ok(())
}
