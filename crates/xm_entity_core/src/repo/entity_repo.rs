//! Entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `xm_entity`, `link` and the composition tables.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate models before SQL mutations.
//! - Every write that changes an entity's own state, its links or its
//!   children increments that entity's `version`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::composition::{ChildRef, CompositionKind, NewChild};
use crate::model::entity::{EntityId, EntityValidationError, XmEntity};
use crate::model::link::{Link, LinkId, LinkValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ENTITY_SELECT_SQL: &str = "SELECT
    id,
    entity_key,
    type_key,
    name,
    version,
    created_at,
    updated_at
FROM xm_entity";

pub(crate) const LINK_SELECT_SQL: &str = "SELECT
    id,
    type_key,
    source_id,
    target_id
FROM link";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    InvalidEntity(EntityValidationError),
    InvalidLink(LinkValidationError),
    Db(DbError),
    NotFound(EntityId),
    LinkNotFound(LinkId),
    ChildNotFound(ChildRef),
    /// Stored version differs from the caller's. `actual` is `None` when the
    /// row no longer exists.
    VersionConflict {
        id: EntityId,
        expected: i64,
        actual: Option<i64>,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEntity(err) => write!(f, "{err}"),
            Self::InvalidLink(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "entity not found: {id}"),
            Self::LinkNotFound(id) => write!(f, "link not found: {id}"),
            Self::ChildNotFound(child) => write!(
                f,
                "{} not found: {} (owner {})",
                child.kind.as_str(),
                child.id,
                child.owner_id
            ),
            Self::VersionConflict {
                id,
                expected,
                actual: Some(actual),
            } => write!(
                f,
                "entity {id} version conflict: expected {expected}, found {actual}"
            ),
            Self::VersionConflict {
                id,
                expected,
                actual: None,
            } => write!(
                f,
                "entity {id} version conflict: expected {expected}, row is gone"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "entity repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "entity repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEntity(err) => Some(err),
            Self::InvalidLink(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::InvalidEntity(value)
    }
}

impl From<LinkValidationError> for RepoError {
    fn from(value: LinkValidationError) -> Self {
        Self::InvalidLink(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for entity, link and composition CRUD.
pub trait EntityRepository {
    /// Inserts a new entity and returns the persisted row.
    fn create_entity(&self, entity: &XmEntity) -> RepoResult<XmEntity>;
    /// Updates key/type/name when `entity.version` matches the stored one.
    fn update_entity(&self, entity: &XmEntity) -> RepoResult<XmEntity>;
    fn get_entity(&self, id: EntityId) -> RepoResult<Option<XmEntity>>;
    fn exists(&self, id: EntityId) -> RepoResult<bool>;
    /// Inserts a link between two existing entities.
    fn create_link(&self, link: &Link) -> RepoResult<Link>;
    fn get_link(&self, id: LinkId) -> RepoResult<Option<Link>>;
    fn list_links_from(&self, source_id: EntityId) -> RepoResult<Vec<Link>>;
    fn list_links_to(&self, target_id: EntityId) -> RepoResult<Vec<Link>>;
    /// Inserts one composition child (and its nested rows) under `owner_id`.
    fn add_child(&self, owner_id: EntityId, child: &NewChild) -> RepoResult<ChildRef>;
    /// Counts top-level composition children of one kind.
    fn count_children(&self, owner_id: EntityId, kind: CompositionKind) -> RepoResult<usize>;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn create_entity(&self, entity: &XmEntity) -> RepoResult<XmEntity> {
        entity.validate()?;

        self.conn.execute(
            "INSERT INTO xm_entity (
                id,
                entity_key,
                type_key,
                name,
                version
            ) VALUES (?1, ?2, ?3, ?4, 0);",
            params![
                entity.id.to_string(),
                entity.key.as_str(),
                entity.type_key.as_str(),
                entity.name.as_str(),
            ],
        )?;

        load_required_entity(self.conn, entity.id)
    }

    fn update_entity(&self, entity: &XmEntity) -> RepoResult<XmEntity> {
        entity.validate()?;

        let changed = self.conn.execute(
            "UPDATE xm_entity
             SET
                entity_key = ?2,
                type_key = ?3,
                name = ?4,
                version = version + 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND version = ?5;",
            params![
                entity.id.to_string(),
                entity.key.as_str(),
                entity.type_key.as_str(),
                entity.name.as_str(),
                entity.version,
            ],
        )?;

        if changed == 0 {
            return Err(version_conflict(self.conn, entity.id, entity.version)?);
        }

        load_required_entity(self.conn, entity.id)
    }

    fn get_entity(&self, id: EntityId) -> RepoResult<Option<XmEntity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTITY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entity_row(row)?));
        }
        Ok(None)
    }

    fn exists(&self, id: EntityId) -> RepoResult<bool> {
        entity_exists(self.conn, id)
    }

    fn create_link(&self, link: &Link) -> RepoResult<Link> {
        link.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for endpoint in [link.source_id, link.target_id] {
            if !entity_exists(&tx, endpoint)? {
                return Err(RepoError::NotFound(endpoint));
            }
        }

        tx.execute(
            "INSERT INTO link (id, type_key, source_id, target_id)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                link.id.to_string(),
                link.type_key.as_str(),
                link.source_id.to_string(),
                link.target_id.to_string(),
            ],
        )?;
        touch_entity(&tx, link.source_id)?;
        tx.commit()?;

        Ok(link.clone())
    }

    fn get_link(&self, id: LinkId) -> RepoResult<Option<Link>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LINK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_link_row(row)?));
        }
        Ok(None)
    }

    fn list_links_from(&self, source_id: EntityId) -> RepoResult<Vec<Link>> {
        query_links(self.conn, "source_id", source_id)
    }

    fn list_links_to(&self, target_id: EntityId) -> RepoResult<Vec<Link>> {
        query_links(self.conn, "target_id", target_id)
    }

    fn add_child(&self, owner_id: EntityId, child: &NewChild) -> RepoResult<ChildRef> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !entity_exists(&tx, owner_id)? {
            return Err(RepoError::NotFound(owner_id));
        }

        let child_id = Uuid::new_v4();
        let id_text = child_id.to_string();
        let owner_text = owner_id.to_string();
        match child {
            NewChild::Attachment { type_key, name } => {
                tx.execute(
                    "INSERT INTO attachment (id, xm_entity_id, type_key, name)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![id_text, owner_text, type_key, name],
                )?;
            }
            NewChild::Comment { user_key, message } => {
                tx.execute(
                    "INSERT INTO comment (id, xm_entity_id, user_key, message)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![id_text, owner_text, user_key, message],
                )?;
            }
            NewChild::Tag { type_key, name } => {
                tx.execute(
                    "INSERT INTO tag (id, xm_entity_id, type_key, name)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![id_text, owner_text, type_key, name],
                )?;
            }
            NewChild::Calendar {
                type_key,
                name,
                events,
            } => {
                tx.execute(
                    "INSERT INTO calendar (id, xm_entity_id, type_key, name)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![id_text, owner_text, type_key, name],
                )?;
                for event in events {
                    tx.execute(
                        "INSERT INTO calendar_event (id, calendar_id, type_key, title)
                         VALUES (?1, ?2, ?3, ?4);",
                        params![
                            Uuid::new_v4().to_string(),
                            id_text,
                            event.type_key,
                            event.title
                        ],
                    )?;
                }
            }
            NewChild::Location { type_key, name } => {
                tx.execute(
                    "INSERT INTO location (id, xm_entity_id, type_key, name)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![id_text, owner_text, type_key, name],
                )?;
            }
            NewChild::Rating { type_key, votes } => {
                tx.execute(
                    "INSERT INTO rating (id, xm_entity_id, type_key)
                     VALUES (?1, ?2, ?3);",
                    params![id_text, owner_text, type_key],
                )?;
                for vote in votes {
                    tx.execute(
                        "INSERT INTO vote (id, rating_id, user_key, value, message)
                         VALUES (?1, ?2, ?3, ?4, ?5);",
                        params![
                            Uuid::new_v4().to_string(),
                            id_text,
                            vote.user_key,
                            vote.value,
                            vote.message
                        ],
                    )?;
                }
            }
            NewChild::FunctionContext { key, type_key } => {
                tx.execute(
                    "INSERT INTO function_context (id, xm_entity_id, context_key, type_key)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![id_text, owner_text, key, type_key],
                )?;
            }
        }
        touch_entity(&tx, owner_id)?;
        tx.commit()?;

        Ok(ChildRef {
            kind: child.kind(),
            id: child_id,
            owner_id,
        })
    }

    fn count_children(&self, owner_id: EntityId, kind: CompositionKind) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE xm_entity_id = ?1;",
                child_table(kind)
            ),
            [owner_id.to_string()],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative child count {count}")))
    }
}

/// Storage table holding composition children of `kind`.
pub(crate) fn child_table(kind: CompositionKind) -> &'static str {
    match kind {
        CompositionKind::Attachment => "attachment",
        CompositionKind::Comment => "comment",
        CompositionKind::Tag => "tag",
        CompositionKind::Calendar => "calendar",
        CompositionKind::Location => "location",
        CompositionKind::Rating => "rating",
        CompositionKind::FunctionContext => "function_context",
    }
}

pub(crate) fn entity_exists(conn: &Connection, id: EntityId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM xm_entity WHERE id = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn current_version(conn: &Connection, id: EntityId) -> RepoResult<Option<i64>> {
    let version = conn
        .query_row(
            "SELECT version FROM xm_entity WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version)
}

/// Builds the error for an update that matched no row.
fn version_conflict(conn: &Connection, id: EntityId, expected: i64) -> RepoResult<RepoError> {
    match current_version(conn, id)? {
        None => Ok(RepoError::NotFound(id)),
        actual => Ok(RepoError::VersionConflict {
            id,
            expected,
            actual,
        }),
    }
}

fn touch_entity(conn: &Connection, id: EntityId) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE xm_entity
         SET version = version + 1,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        [id.to_string()],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(id));
    }
    Ok(())
}

fn load_required_entity(conn: &Connection, id: EntityId) -> RepoResult<XmEntity> {
    let mut stmt = conn.prepare(&format!("{ENTITY_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_entity_row(row);
    }
    Err(RepoError::NotFound(id))
}

pub(crate) fn query_links(
    conn: &Connection,
    column: &'static str,
    entity_id: EntityId,
) -> RepoResult<Vec<Link>> {
    let mut stmt = conn.prepare(&format!(
        "{LINK_SELECT_SQL}
         WHERE {column} = ?1
         ORDER BY created_at ASC, id ASC;"
    ))?;
    let mut rows = stmt.query([entity_id.to_string()])?;
    let mut links = Vec::new();
    while let Some(row) = rows.next()? {
        links.push(parse_link_row(row)?);
    }
    Ok(links)
}

fn parse_entity_row(row: &Row<'_>) -> RepoResult<XmEntity> {
    let id_text: String = row.get("id")?;
    let entity = XmEntity {
        id: parse_uuid(&id_text, "xm_entity.id")?,
        key: row.get("entity_key")?,
        type_key: row.get("type_key")?,
        name: row.get("name")?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    entity.validate()?;
    Ok(entity)
}

pub(crate) fn parse_link_row(row: &Row<'_>) -> RepoResult<Link> {
    let id_text: String = row.get("id")?;
    let source_text: String = row.get("source_id")?;
    let target_text: String = row.get("target_id")?;
    Ok(Link {
        id: parse_uuid(&id_text, "link.id")?,
        type_key: row.get("type_key")?,
        source_id: parse_uuid(&source_text, "link.source_id")?,
        target_id: parse_uuid(&target_text, "link.target_id")?,
    })
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["xm_entity", "link", "calendar_event", "vote"]
        .into_iter()
        .chain(CompositionKind::ALL.into_iter().map(child_table))
    {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &'static str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
