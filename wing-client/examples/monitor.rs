//! Live console monitor.
//!
//! Connects to the console given as `host:port` (or the first one found
//! by discovery), subscribes a few meters, and prints every parameter
//! change and meter batch until interrupted.
//!
//! ```text
//! cargo run --example monitor -- 192.168.1.10:2222
//! ```

use wing_client::{Console, MeterBank, MeterId};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let console = match std::env::args().nth(1) {
        Some(addr) => Console::connect_to(addr)?,
        None => Console::connect_first()?,
    };

    console.subscribe_meters(&[
        MeterId::new(MeterBank::Channel, 0),
        MeterId::new(MeterBank::Channel, 1),
        MeterId::new(MeterBank::Main, 0),
    ])?;

    std::thread::scope(|s| {
        s.spawn(|| loop {
            match console.read_meters() {
                Ok(update) => {
                    let line: Vec<String> = update
                        .levels
                        .iter()
                        .map(|(id, level)| format!("{id}={level}"))
                        .collect();
                    println!("meters: {}", line.join(" "));
                }
                Err(e) => {
                    eprintln!("meter stream ended: {e}");
                    break;
                }
            }
        });

        loop {
            match console.read() {
                Ok(resp) => println!("{resp:?}"),
                Err(e) => {
                    eprintln!("session ended: {e}");
                    break;
                }
            }
        }
    });

    Ok(())
}
