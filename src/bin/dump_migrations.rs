// Write every backend's migration units as ordered .sql files for review.
// Usage: dump_migrations [output_dir]   (default: migrations)

use std::fs;
use std::path::PathBuf;

use chain_store::db::migration::registry;
use chain_store::schema::Backend;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "migrations".to_string()));

    for backend in Backend::ALL {
        let dir = out_dir.join(backend.as_str());
        fs::create_dir_all(&dir)?;

        for unit in registry(backend) {
            let path = dir.join(format!("{}.sql", unit.id()));
            let header = format!("-- {} ({})\n-- checksum: {}\n\n", unit.id(), backend, unit.checksum());
            fs::write(&path, header + &unit.script())?;
            println!("✅ {}", path.display());
        }
    }

    println!("All migration units written to {}", out_dir.display());
    Ok(())
}
