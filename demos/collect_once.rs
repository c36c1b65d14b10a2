use openweather_archive::{
    selected_fields, ApiClient, ApiUnits, ComplexityTier, FieldCatalog, FieldDefinition, LatLon,
    Module,
};
use std::env;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let api_key = env::var("OPENWEATHER_API_KEY")?;

    let catalog = FieldCatalog::embedded()?;
    let fields: Vec<FieldDefinition> =
        selected_fields(catalog.tier(ComplexityTier::Standard), &catalog)
            .into_iter()
            .cloned()
            .collect();

    let client = ApiClient::builder()
        .api_key(api_key)
        .location(LatLon(52.3676, 4.9041))
        .units(ApiUnits::Metric)
        .build()?;

    for module in [Module::CurrentWeather, Module::AirQuality] {
        let reading = client.collect(module, &fields)?;
        println!("{module}:");
        for (column, value) in &reading.values {
            println!("  {column} = {value}");
        }
    }

    Ok(())
}
