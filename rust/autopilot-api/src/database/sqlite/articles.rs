use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};

use super::{SqliteStore, from_json, to_json};
use crate::database::repository::ArticleRepository;
use crate::database::schema::format_ts;
use crate::domain::Article;

#[async_trait]
impl ArticleRepository for SqliteStore {
    async fn create_article(&self, article: &Article) -> anyhow::Result<()> {
        let id = article.id.clone();
        let tenant_id = article.tenant_id.clone();
        let project_id = article.project_id.clone();
        let status = article.status.as_str();
        let schedule_id = article.schedule_id.clone();
        let created_at = format_ts(article.created_at);
        let data = to_json(article)?;

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO articles (id, tenant_id, project_id, status, schedule_id, created_at, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, tenant_id, project_id, status, schedule_id, created_at, data],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_article(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Article>> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();

        self.blocking(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM articles WHERE id = ?1 AND tenant_id = ?2",
                    params![id, tenant_id],
                    |row| row.get(0),
                )
                .optional()?;
            data.as_deref().map(from_json).transpose()
        })
        .await
    }

    async fn list_articles(
        &self,
        tenant_id: &str,
        project_id: &str,
    ) -> anyhow::Result<Vec<Article>> {
        let tenant_id = tenant_id.to_string();
        let project_id = project_id.to_string();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT data FROM articles WHERE tenant_id = ?1 AND project_id = ?2
                 ORDER BY created_at, id",
            )?;
            let rows = stmt.query_map(params![tenant_id, project_id], |row| {
                row.get::<_, String>(0)
            })?;
            rows.map(|data| from_json(&data?)).collect()
        })
        .await
    }

    async fn update_article(&self, article: &Article) -> anyhow::Result<()> {
        let id = article.id.clone();
        let tenant_id = article.tenant_id.clone();
        let status = article.status.as_str();
        let schedule_id = article.schedule_id.clone();
        let data = to_json(article)?;

        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE articles SET status = ?3, schedule_id = ?4, data = ?5
                 WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id, status, schedule_id, data],
            )?;
            anyhow::ensure!(updated == 1, "Article {id} not found");
            Ok(())
        })
        .await
    }

    async fn delete_article(&self, tenant_id: &str, id: &str) -> anyhow::Result<bool> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();

        self.blocking(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM articles WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id],
            )?;
            Ok(deleted > 0)
        })
        .await
    }
}
