use rusqlite::Connection;

use crate::error::Result;

/// Initialise the entity tables. Safe to call on every startup — uses
/// `IF NOT EXISTS` throughout.
///
/// Each entity is stored as a single JSON blob column plus a handful of
/// columns used for indexing/lookup. The blob is the full serialized
/// `Agent`/`Meeting` document, so round-trip fidelity reduces to serde
/// round-trip fidelity — there is no lossy column mapping to keep in sync
/// as the domain types evolve.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS agents (
            id          TEXT PRIMARY KEY,
            doc         TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS meetings (
            id          TEXT PRIMARY KEY,
            status      TEXT NOT NULL,
            doc         TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_meetings_status ON meetings(status);

        CREATE TABLE IF NOT EXISTS meeting_participants (
            meeting_id  TEXT NOT NULL,
            agent_id    TEXT NOT NULL,
            PRIMARY KEY (meeting_id, agent_id)
        );
        CREATE INDEX IF NOT EXISTS idx_participants_agent ON meeting_participants(agent_id);",
    )?;
    Ok(())
}
