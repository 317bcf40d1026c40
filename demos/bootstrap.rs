use std::sync::Arc;

use dragon_cfg::{AppContext, BootstrapRegistry, Config};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct AppConfig {
    app: AppSection,
    database: DatabaseSection,
}

#[derive(Debug, Deserialize)]
struct AppSection {
    name: String,
    debug: bool,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct DatabaseSection {
    host: String,
    port: u16,
    name: String,
    url: String,
}

fn main() -> Result<(), dragon_cfg::Error> {
    let resources = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/resources");
    let registry = Arc::new(BootstrapRegistry::new());

    // MYAPP__PROFILES__ACTIVE=dev switches to the dev database
    let environment = Config::builder()
        .with_classpath_root(resources)
        .with_working_dir(resources)
        .with_env("MYAPP", "__")
        .with_bootstrap_registry(registry.clone())
        .load()?;

    for source in environment.property_sources() {
        println!("source: {}", source.name());
    }

    let ctx = AppContext::builder()
        .with_environment(environment)
        .build::<AppConfig>()?;
    let config = ctx.config();

    println!("Profiles: {:?}", ctx.active_profiles());
    println!("App: {} (debug={})", config.app.name, config.app.debug);
    println!("Database URL: {}", config.database.url);
    println!("Binder snapshots published: {}", registry.generation());

    Ok(())
}
