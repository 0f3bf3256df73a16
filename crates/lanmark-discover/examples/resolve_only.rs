//! Resolve a service (for testing with register_only)

use std::time::Duration;

use lanmark_discover::{BonjourFacility, DiscoverConfig, EventPump, ResolveParams, ServiceHandle};
use lanmark_util::{log, LogConfig};

fn main() -> anyhow::Result<()> {
    let config = DiscoverConfig::load(None)?;
    log::init(&LogConfig::default().with_level(config.log_level.unwrap_or_default()))?;

    let name = std::env::args().nth(1).unwrap_or_else(|| "lanmark-test".to_string());

    println!("=== Resolve Only ===\n");

    let pump = EventPump::with_config(BonjourFacility::new(), config)?;
    let handle = ServiceHandle::new();

    println!("Resolving {name:?} for 10 seconds...");
    let params = ResolveParams::new(name, "_http._tcp", "local.");
    let mut rx = pump.resolver().resolve_channel(&handle, &params)?;
    pump.run_for(Duration::from_secs(10))?;
    handle.stop();

    println!("\n=== Results ===");
    let mut found = 0;
    while let Ok(result) = rx.try_recv() {
        match result {
            Ok(service) => {
                found += 1;
                println!("Found: {}", service);
                println!("  Interface: {}", service.interface_index);
                if let Ok(txt) = service.txt_record() {
                    for (key, value) in txt.iter() {
                        let value = value.map(String::from_utf8_lossy);
                        println!("  {}: {:?}", key, value);
                    }
                }
            }
            Err(e) => eprintln!("Resolve error: {}", e),
        }
    }
    println!("\nTotal results: {}", found);

    println!("Done!");
    Ok(())
}
