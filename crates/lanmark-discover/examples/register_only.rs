//! Register a service (for testing with resolve_only)

use std::time::Duration;

use lanmark_discover::{
    BonjourFacility, DiscoverConfig, EventPump, RegisterParams, ServiceHandle, TxtRecord,
};
use lanmark_util::{log, LogConfig};

fn main() -> anyhow::Result<()> {
    let config = DiscoverConfig::load(None)?;
    log::init(&LogConfig::default().with_level(config.log_level.unwrap_or_default()))?;

    println!("=== Register Only ===\n");

    let pump = EventPump::with_config(BonjourFacility::new(), config)?;
    let handle = ServiceHandle::new();

    let mut txt = TxtRecord::new();
    txt.insert("version", env!("CARGO_PKG_VERSION"))?;
    txt.insert("path", "/")?;

    println!("Registering service...");
    let params = RegisterParams::new("_http._tcp", 3000)
        .with_name("lanmark-test")
        .with_txt(txt);
    pump.registrar().register(&handle, &params, |result| match result {
        Ok(registration) => println!("Registered: {}", registration),
        Err(e) => eprintln!("Registration failed: {}", e),
    })?;

    println!("\nKeeping the service published for 30 seconds...");
    println!("Run resolve_only in another terminal to find it.\n");
    pump.run_for(Duration::from_secs(30))?;

    println!("Stopping...");
    handle.stop();

    println!("Done!");
    Ok(())
}
