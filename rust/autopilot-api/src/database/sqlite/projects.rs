use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};

use super::{SqliteStore, from_json, to_json};
use crate::database::repository::ProjectRepository;
use crate::database::schema::format_ts;
use crate::domain::Project;

#[async_trait]
impl ProjectRepository for SqliteStore {
    async fn create_project(&self, project: &Project) -> anyhow::Result<()> {
        let id = project.id.clone();
        let tenant_id = project.tenant_id.clone();
        let created_at = format_ts(project.created_at);
        let data = to_json(project)?;

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO projects (id, tenant_id, created_at, data) VALUES (?1, ?2, ?3, ?4)",
                params![id, tenant_id, created_at, data],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_project(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Project>> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();

        self.blocking(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM projects WHERE id = ?1 AND tenant_id = ?2",
                    params![id, tenant_id],
                    |row| row.get(0),
                )
                .optional()?;
            data.as_deref().map(from_json).transpose()
        })
        .await
    }

    async fn list_projects(&self, tenant_id: &str) -> anyhow::Result<Vec<Project>> {
        let tenant_id = tenant_id.to_string();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT data FROM projects WHERE tenant_id = ?1 ORDER BY created_at, id",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| row.get::<_, String>(0))?;
            rows.map(|data| from_json(&data?)).collect()
        })
        .await
    }

    async fn update_project(&self, project: &Project) -> anyhow::Result<()> {
        let id = project.id.clone();
        let tenant_id = project.tenant_id.clone();
        let data = to_json(project)?;

        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE projects SET data = ?3 WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id, data],
            )?;
            anyhow::ensure!(updated == 1, "Project {id} not found");
            Ok(())
        })
        .await
    }

    async fn delete_project(&self, tenant_id: &str, id: &str) -> anyhow::Result<bool> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();

        // Schedules, articles and content belong to the project and go with it.
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(
                "DELETE FROM projects WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id],
            )?;
            if deleted > 0 {
                tx.execute(
                    "DELETE FROM schedules WHERE project_id = ?1 AND tenant_id = ?2",
                    params![id, tenant_id],
                )?;
                tx.execute(
                    "DELETE FROM contents WHERE tenant_id = ?2 AND article_id IN
                        (SELECT id FROM articles WHERE project_id = ?1 AND tenant_id = ?2)",
                    params![id, tenant_id],
                )?;
                tx.execute(
                    "DELETE FROM articles WHERE project_id = ?1 AND tenant_id = ?2",
                    params![id, tenant_id],
                )?;
            }
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WordPressCredentials;

    #[tokio::test]
    async fn test_project_crud_is_tenant_scoped() {
        let store = SqliteStore::in_memory().unwrap();
        let mut project = Project::new("tenant-a", "Garden blog");
        store.create_project(&project).await.unwrap();

        assert!(store.get_project("tenant-b", &project.id).await.unwrap().is_none());
        assert_eq!(store.list_projects("tenant-a").await.unwrap().len(), 1);
        assert!(store.list_projects("tenant-b").await.unwrap().is_empty());

        project.wordpress = Some(WordPressCredentials {
            base_url: "https://garden.example".into(),
            username: "editor".into(),
            app_password: "secret".into(),
        });
        store.update_project(&project).await.unwrap();
        let loaded = store.get_project("tenant-a", &project.id).await.unwrap().unwrap();
        assert!(loaded.has_wordpress());

        assert!(!store.delete_project("tenant-b", &project.id).await.unwrap());
        assert!(store.delete_project("tenant-a", &project.id).await.unwrap());
        assert!(store.get_project("tenant-a", &project.id).await.unwrap().is_none());
    }
}
