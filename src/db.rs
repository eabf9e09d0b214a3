use crate::config::Config;
use crate::error::BookError;
use crate::model::*;
use anyhow::Result;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use std::path::Path;
use std::time::Duration;

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[("001_schema.sql", include_str!("migrations/001_schema.sql"))];

pub struct Database {
    db: LibsqlDatabase,
    conn: Connection,
    replica: bool,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn is_replica(&self) -> bool {
        self.replica
    }

    pub async fn sync(&self) -> Result<()> {
        if self.replica {
            self.db
                .sync()
                .await
                .map_err(|e| anyhow::anyhow!("sync failed: {}", e))?;
        }
        Ok(())
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    async fn setup(db: LibsqlDatabase, replica: bool) -> Result<Self> {
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS.iter().chain(MIGRATIONS) {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database { db, conn, replica })
    }

    pub async fn open(cfg: &Config, data_dir: &Path) -> Result<Self> {
        if cfg.app.is_in_memory() {
            tracing::info!("[db] running in in-memory mode, nothing will be persisted");
            return Self::open_in_memory().await;
        }

        let path = data_dir.join(cfg.app.get_db());

        let (db, replica) = match cfg.app.replica() {
            Some((url, token)) => {
                tracing::info!("[db] running in synced database mode (offline writes)");
                let sync_interval = Duration::from_secs(cfg.app.sync_interval_seconds);
                let db = Builder::new_synced_database(&path, url.to_string(), token.to_string())
                    .sync_interval(sync_interval)
                    .build()
                    .await?;
                (db, true)
            }
            None => {
                tracing::info!(path = ?path, "[db] running in local mode");
                (Builder::new_local(&path).build().await?, false)
            }
        };

        Self::setup(db, replica).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(crate::config::IN_MEMORY).build().await?;
        Self::setup(db, false).await
    }

    pub async fn close(self) -> Result<()> {
        self.sync().await?;
        let Database { db, conn, .. } = self;
        drop(conn);
        drop(db);
        tracing::info!("[db] closed");
        Ok(())
    }

    fn row_to_book(row: &libsql::Row) -> Result<Book, BookError> {
        let comments: String = row.get(2)?;
        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            comments: serde_json::from_str(&comments)?,
        })
    }

    pub async fn list_books(&self) -> Result<Vec<BookSummary>, BookError> {
        let query = r#"
            SELECT id, title, json_array_length(comments)
            FROM books
            ORDER BY created_at, rowid
        "#;

        let mut rows = self.conn.query(query, ()).await?;
        let mut books = vec![];

        while let Some(row) = rows.next().await? {
            books.push(BookSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                commentcount: row.get(2)?,
            });
        }

        Ok(books)
    }

    pub async fn create_book(&self, input: CreateBook) -> Result<CreatedBook, BookError> {
        let title = validate_title(input)?;
        let id = BookId::generate();

        let query = r#"
            INSERT INTO books (id, title, comments)
            VALUES (?, ?, '[]')
            RETURNING id, title
        "#;

        let mut rows = self
            .conn
            .query(query, libsql::params![id.as_string(), title.as_str()])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(CreatedBook {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        } else {
            Err(anyhow::anyhow!("insert returned no row for book {}", id.as_string()).into())
        }
    }

    pub async fn get_book(&self, id: &str) -> Result<Book, BookError> {
        let id = BookId::parse(id)?;
        let query = "SELECT id, title, comments FROM books WHERE id = ?";

        let mut rows = self.conn.query(query, libsql::params![id.as_string()]).await?;

        match rows.next().await? {
            Some(row) => Self::row_to_book(&row),
            None => Err(BookError::NotFound),
        }
    }

    /// Appends in place so the read and the write are one statement.
    pub async fn add_comment(&self, id: &str, input: CreateComment) -> Result<Book, BookError> {
        let comment = validate_comment(input)?;
        let id = BookId::parse(id)?;

        let query = r#"
            UPDATE books
            SET comments = json_insert(comments, '$[#]', ?)
            WHERE id = ?
            RETURNING id, title, comments
        "#;

        let mut rows = self
            .conn
            .query(query, libsql::params![comment.as_str(), id.as_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Self::row_to_book(&row),
            None => Err(BookError::NotFound),
        }
    }

    pub async fn delete_book(&self, id: &str) -> Result<(), BookError> {
        let id = BookId::parse(id)?;

        let deleted = self
            .conn
            .execute("DELETE FROM books WHERE id = ?", libsql::params![id.as_string()])
            .await?;

        if deleted == 0 {
            return Err(BookError::NotFound);
        }
        Ok(())
    }

    /// Returns how many books were removed. An empty store is reported as
    /// `NothingToDelete` rather than success.
    pub async fn delete_all_books(&self) -> Result<u64, BookError> {
        let deleted = self.conn.execute("DELETE FROM books", ()).await?;

        if deleted == 0 {
            return Err(BookError::NothingToDelete);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn new_book(title: &str) -> CreateBook {
        CreateBook {
            title: Some(title.to_string()),
        }
    }

    fn new_comment(comment: &str) -> CreateComment {
        CreateComment {
            comment: Some(comment.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let db = setup().await;

        let created = db.create_book(new_book("The Left Hand of Darkness")).await.unwrap();
        assert_eq!(created.title, "The Left Hand of Darkness");
        assert!(BookId::parse(&created.id).is_ok());

        let book = db.get_book(&created.id).await.unwrap();
        assert_eq!(book.id, created.id);
        assert_eq!(book.title, "The Left Hand of Darkness");
        assert!(book.comments.is_empty());
    }

    #[tokio::test]
    async fn test_create_without_title_persists_nothing() {
        let db = setup().await;

        let err = db.create_book(CreateBook::default()).await.unwrap_err();
        assert!(matches!(err, BookError::MissingField("title")));

        let err = db.create_book(new_book("")).await.unwrap_err();
        assert!(matches!(err, BookError::MissingField("title")));

        assert!(db.list_books().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_comment_appends_in_order() {
        let db = setup().await;
        let created = db.create_book(new_book("Solaris")).await.unwrap();

        let book = db.add_comment(&created.id, new_comment("first")).await.unwrap();
        assert_eq!(book.comments, vec!["first"]);

        let book = db.add_comment(&created.id, new_comment("second")).await.unwrap();
        assert_eq!(book.comments, vec!["first", "second"]);
        assert_eq!(book.title, "Solaris");

        let fetched = db.get_book(&created.id).await.unwrap();
        assert_eq!(fetched, book);
    }

    #[tokio::test]
    async fn test_add_comment_keeps_quotes_and_json_like_text() {
        let db = setup().await;
        let created = db.create_book(new_book("Escapes")).await.unwrap();

        let text = r#"she said "hi" and ["not", "an", "array"]"#;
        let book = db.add_comment(&created.id, new_comment(text)).await.unwrap();
        assert_eq!(book.comments, vec![text]);
    }

    #[tokio::test]
    async fn test_add_comment_without_comment_does_not_mutate() {
        let db = setup().await;
        let created = db.create_book(new_book("Ubik")).await.unwrap();
        db.add_comment(&created.id, new_comment("keep")).await.unwrap();

        let err = db
            .add_comment(&created.id, CreateComment { comment: None })
            .await
            .unwrap_err();
        assert!(matches!(err, BookError::MissingField("comment")));

        let book = db.get_book(&created.id).await.unwrap();
        assert_eq!(book.comments, vec!["keep"]);
    }

    #[tokio::test]
    async fn test_missing_comment_reported_before_unknown_id() {
        let db = setup().await;

        let err = db
            .add_comment("not-an-id", CreateComment::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BookError::MissingField("comment")));
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids_are_not_found() {
        let db = setup().await;
        let unknown = BookId::generate().as_string();

        for id in [unknown.as_str(), "000000000000000000000000", "garbage"] {
            assert!(matches!(db.get_book(id).await, Err(BookError::NotFound)));
            assert!(matches!(
                db.add_comment(id, new_comment("hi")).await,
                Err(BookError::NotFound)
            ));
            assert!(matches!(db.delete_book(id).await, Err(BookError::NotFound)));
        }
    }

    #[tokio::test]
    async fn test_delete_then_get() {
        let db = setup().await;
        let keep = db.create_book(new_book("Keep")).await.unwrap();
        let gone = db.create_book(new_book("Gone")).await.unwrap();

        db.delete_book(&gone.id).await.unwrap();

        assert!(matches!(db.get_book(&gone.id).await, Err(BookError::NotFound)));
        assert!(matches!(db.delete_book(&gone.id).await, Err(BookError::NotFound)));
        assert!(db.get_book(&keep.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_reports_comment_count() {
        let db = setup().await;
        let first = db.create_book(new_book("First")).await.unwrap();
        let second = db.create_book(new_book("Second")).await.unwrap();
        db.add_comment(&second.id, new_comment("a")).await.unwrap();
        db.add_comment(&second.id, new_comment("b")).await.unwrap();

        let books = db.list_books().await.unwrap();
        assert_eq!(
            books,
            vec![
                BookSummary {
                    title: "First".to_string(),
                    id: first.id,
                    commentcount: 0,
                },
                BookSummary {
                    title: "Second".to_string(),
                    id: second.id,
                    commentcount: 2,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_all() {
        let db = setup().await;
        assert!(matches!(db.delete_all_books().await, Err(BookError::NothingToDelete)));

        db.create_book(new_book("One")).await.unwrap();
        db.create_book(new_book("Two")).await.unwrap();

        assert_eq!(db.delete_all_books().await.unwrap(), 2);
        assert!(db.list_books().await.unwrap().is_empty());
        assert!(matches!(db.delete_all_books().await, Err(BookError::NothingToDelete)));
    }

    #[tokio::test]
    async fn test_migrations_are_recorded_once() {
        let db = setup().await;
        for (name, sql) in SYSTEM_MIGRATIONS.iter().chain(MIGRATIONS) {
            Database::run_migration(db.connection(), name, sql).await.unwrap();
        }

        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM _migrations", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let count: i64 = row.get(0).unwrap();
        assert_eq!(count, (SYSTEM_MIGRATIONS.len() + MIGRATIONS.len()) as i64);
    }

    #[tokio::test]
    async fn test_open_local_file_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let cfg: Config = serde_yaml::from_str("app:\n  database: books.db\n  port: 3000\n").unwrap();

        let db = Database::open(&cfg, dir.path()).await.unwrap();
        assert!(!db.is_replica());
        let created = db.create_book(new_book("Durable")).await.unwrap();
        db.close().await.unwrap();

        let db = Database::open(&cfg, dir.path()).await.unwrap();
        assert_eq!(db.get_book(&created.id).await.unwrap().title, "Durable");
    }
}
