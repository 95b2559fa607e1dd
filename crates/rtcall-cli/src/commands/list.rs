//! `rtcall list`: print the registered runtime entries.

pub fn execute() -> anyhow::Result<()> {
    let registry = super::registry();
    println!("{:<20} {:<6} {}", "ENTRY", "KIND", "ARITY");
    for entry in registry.iter() {
        println!("{:<20} {:<6} {}", entry.name(), entry.kind().to_string(), entry.arity());
    }
    Ok(())
}
