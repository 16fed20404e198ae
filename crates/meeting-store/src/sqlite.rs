use std::sync::Mutex;

use meeting_core::{Agent, AgentId, Meeting, MeetingId, MeetingStatus};
use rusqlite::{params, Connection};
use tracing::instrument;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::traits::EntityStore;

/// SQLite-backed reference implementation of [`EntityStore`].
///
/// Wraps a single connection in a `Mutex`. A connection pool would be the
/// natural next step for a multi-node deployment, but single-process
/// horizontal scale-out is out of scope here.
pub struct SqliteEntityStore {
    db: Mutex<Connection>,
}

impl SqliteEntityStore {
    /// Wrap an already-open connection, initialising the schema.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Open (or create) a SQLite file at `path`.
    pub fn open(path: &str) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    /// Open a private in-memory database — handy for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn status_str(status: MeetingStatus) -> &'static str {
        match status {
            MeetingStatus::Active => "active",
            MeetingStatus::Paused => "paused",
            MeetingStatus::Ended => "ended",
        }
    }
}

impl EntityStore for SqliteEntityStore {
    #[instrument(skip(self, agent), fields(agent_id = %agent.id))]
    fn save_agent(&self, agent: &Agent) -> Result<()> {
        let doc = serde_json::to_string(agent)?;
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO agents (id, doc, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET doc = excluded.doc, updated_at = excluded.updated_at",
            params![agent.id.as_str(), doc, now],
        )?;
        Ok(())
    }

    #[instrument(skip(self), fields(agent_id = %id))]
    fn load_agent(&self, id: &AgentId) -> Result<Option<Agent>> {
        let db = self.db.lock().unwrap();
        let doc: Option<String> = db
            .query_row(
                "SELECT doc FROM agents WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .ok();
        match doc {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    fn list_agents(&self) -> Result<Vec<Agent>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT doc FROM agents ORDER BY updated_at DESC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut agents = Vec::new();
        for doc in rows {
            agents.push(serde_json::from_str(&doc?)?);
        }
        Ok(agents)
    }

    #[instrument(skip(self), fields(agent_id = %id))]
    fn delete_agent(&self, id: &AgentId) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute("DELETE FROM agents WHERE id = ?1", params![id.as_str()])?;
        if rows == 0 {
            return Err(StoreError::NotFound { kind: "agent", id: id.to_string() });
        }
        Ok(())
    }

    #[instrument(skip(self, meeting), fields(meeting_id = %meeting.id))]
    fn save_meeting(&self, meeting: &Meeting) -> Result<()> {
        let doc = serde_json::to_string(meeting)?;
        let now = chrono::Utc::now().to_rfc3339();
        let status = Self::status_str(meeting.status);

        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO meetings (id, status, doc, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, doc = excluded.doc,
                updated_at = excluded.updated_at",
            params![meeting.id.as_str(), status, doc, now],
        )?;
        tx.execute(
            "DELETE FROM meeting_participants WHERE meeting_id = ?1",
            params![meeting.id.as_str()],
        )?;
        for participant in &meeting.participants {
            tx.execute(
                "INSERT INTO meeting_participants (meeting_id, agent_id) VALUES (?1, ?2)",
                params![meeting.id.as_str(), participant.id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self), fields(meeting_id = %id))]
    fn load_meeting(&self, id: &MeetingId) -> Result<Option<Meeting>> {
        let db = self.db.lock().unwrap();
        let doc: Option<String> = db
            .query_row(
                "SELECT doc FROM meetings WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .ok();
        match doc {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    fn list_meetings(&self) -> Result<Vec<Meeting>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT doc FROM meetings ORDER BY updated_at DESC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut meetings = Vec::new();
        for doc in rows {
            meetings.push(serde_json::from_str(&doc?)?);
        }
        Ok(meetings)
    }

    #[instrument(skip(self), fields(meeting_id = %id))]
    fn delete_meeting(&self, id: &MeetingId) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let rows = tx.execute("DELETE FROM meetings WHERE id = ?1", params![id.as_str()])?;
        tx.execute(
            "DELETE FROM meeting_participants WHERE meeting_id = ?1",
            params![id.as_str()],
        )?;
        tx.commit()?;
        if rows == 0 {
            return Err(StoreError::NotFound { kind: "meeting", id: id.to_string() });
        }
        Ok(())
    }

    fn count_live_meetings_referencing(&self, agent_id: &AgentId) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM meeting_participants mp
             JOIN meetings m ON m.id = mp.meeting_id
             WHERE mp.agent_id = ?1 AND m.status != 'ended'",
            params![agent_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
