//! chatterd-seed - provision the schema and default rooms.
//!
//! Opens the configured database (applying the schema as a side effect),
//! creates a `system` participant, and creates each `[seed] rooms` entry
//! owned by it. Idempotent: rooms that already exist are left alone.

use chatterd::config::Config;
use chatterd::db::{Database, DbError};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatterd::telemetry::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    let db = Database::new(&config.database.path).await?;
    let system = db.participants().get_or_create("system").await?;

    for name in &config.seed.rooms {
        match db.rooms().create(name, system.id).await {
            Ok(room) => info!(room = %room.name, id = room.id, "Seeded room"),
            Err(DbError::RoomExists(_)) => {
                info!(room = %name, "Room already present, skipping");
            }
            Err(DbError::RoomNameInvalid) => {
                warn!(room = %name, "Invalid room name in seed config, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let active = db.rooms().list_active().await?;
    info!(
        path = %config.database.path,
        active_rooms = active.len(),
        "Seed complete"
    );
    Ok(())
}
