use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};

use super::{SqliteStore, from_json, to_json};
use crate::database::repository::ContentRepository;
use crate::database::schema::format_ts;
use crate::domain::Content;

#[async_trait]
impl ContentRepository for SqliteStore {
    async fn create_content(&self, content: &Content) -> anyhow::Result<()> {
        let id = content.id.clone();
        let tenant_id = content.tenant_id.clone();
        let article_id = content.article_id.clone();
        let created_at = format_ts(content.created_at);
        let data = to_json(content)?;

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO contents (id, tenant_id, article_id, created_at, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, tenant_id, article_id, created_at, data],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_content(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Content>> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();

        self.blocking(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM contents WHERE id = ?1 AND tenant_id = ?2",
                    params![id, tenant_id],
                    |row| row.get(0),
                )
                .optional()?;
            data.as_deref().map(from_json).transpose()
        })
        .await
    }

    async fn update_content(&self, content: &Content) -> anyhow::Result<()> {
        let id = content.id.clone();
        let tenant_id = content.tenant_id.clone();
        let data = to_json(content)?;

        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE contents SET data = ?3 WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id, data],
            )?;
            anyhow::ensure!(updated == 1, "Content {id} not found");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GeneratedArticle;

    #[tokio::test]
    async fn test_content_update_records_wordpress_post() {
        let store = SqliteStore::in_memory().unwrap();
        let mut content = Content::new(
            "tenant-a",
            "project-1",
            "article-1",
            GeneratedArticle {
                title: "Title".into(),
                content: "<p>Body</p>".into(),
                meta_description: String::new(),
                excerpt: String::new(),
            },
        );
        store.create_content(&content).await.unwrap();

        content.wordpress_post_id = Some(42);
        content.wordpress_url = Some("https://blog.example/?p=42".into());
        store.update_content(&content).await.unwrap();

        let loaded = store.get_content("tenant-a", &content.id).await.unwrap().unwrap();
        assert_eq!(loaded.wordpress_post_id, Some(42));
        assert!(store.get_content("tenant-b", &content.id).await.unwrap().is_none());
    }
}
