use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::{SqliteStore, from_json, to_json};
use crate::database::repository::{DueSchedule, ScheduleRepository};
use crate::database::schema::format_ts;
use crate::domain::Schedule;

/// Column values mirrored out of the serialized schedule.
struct ScheduleRow {
    id: String,
    tenant_id: String,
    project_id: String,
    is_active: bool,
    next_run_at: String,
    claimed_until: Option<String>,
    created_at: String,
    data: String,
}

impl ScheduleRow {
    fn from_schedule(schedule: &Schedule) -> anyhow::Result<Self> {
        Ok(Self {
            id: schedule.id.clone(),
            tenant_id: schedule.tenant_id.clone(),
            project_id: schedule.project_id.clone(),
            is_active: schedule.is_active,
            next_run_at: format_ts(schedule.next_run_at),
            claimed_until: schedule.claimed_until.map(format_ts),
            created_at: format_ts(schedule.created_at),
            data: to_json(schedule)?,
        })
    }

    fn update(&self, conn: &Connection) -> anyhow::Result<usize> {
        Ok(conn.execute(
            "UPDATE schedules
             SET project_id = ?3, is_active = ?4, next_run_at = ?5, claimed_until = ?6, data = ?7
             WHERE id = ?1 AND tenant_id = ?2",
            params![
                self.id,
                self.tenant_id,
                self.project_id,
                self.is_active,
                self.next_run_at,
                self.claimed_until,
                self.data
            ],
        )?)
    }
}

#[async_trait]
impl ScheduleRepository for SqliteStore {
    async fn create_schedule(&self, schedule: &Schedule) -> anyhow::Result<()> {
        let row = ScheduleRow::from_schedule(schedule)?;

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO schedules
                 (id, tenant_id, project_id, is_active, next_run_at, claimed_until, created_at, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.id,
                    row.tenant_id,
                    row.project_id,
                    row.is_active,
                    row.next_run_at,
                    row.claimed_until,
                    row.created_at,
                    row.data
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_schedule(&self, tenant_id: &str, id: &str) -> anyhow::Result<Option<Schedule>> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();

        self.blocking(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM schedules WHERE id = ?1 AND tenant_id = ?2",
                    params![id, tenant_id],
                    |row| row.get(0),
                )
                .optional()?;
            data.as_deref().map(from_json).transpose()
        })
        .await
    }

    async fn list_schedules(&self, tenant_id: &str) -> anyhow::Result<Vec<Schedule>> {
        let tenant_id = tenant_id.to_string();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT data FROM schedules WHERE tenant_id = ?1 ORDER BY created_at, id",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| row.get::<_, String>(0))?;
            rows.map(|data| from_json(&data?)).collect()
        })
        .await
    }

    async fn update_schedule(&self, schedule: &Schedule) -> anyhow::Result<()> {
        let row = ScheduleRow::from_schedule(schedule)?;

        self.blocking(move |conn| {
            let updated = row.update(conn)?;
            anyhow::ensure!(updated == 1, "Schedule {} not found", row.id);
            Ok(())
        })
        .await
    }

    async fn delete_schedule(&self, tenant_id: &str, id: &str) -> anyhow::Result<bool> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();

        self.blocking(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM schedules WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn list_due_schedules(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<DueSchedule>> {
        let now = format_ts(now);

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.data, p.data
                 FROM schedules s
                 JOIN projects p ON p.id = s.project_id AND p.tenant_id = s.tenant_id
                 WHERE s.is_active = 1
                   AND s.next_run_at <= ?1
                   AND (s.claimed_until IS NULL OR s.claimed_until <= ?1)
                 ORDER BY s.next_run_at, s.id",
            )?;
            let rows = stmt.query_map(params![now], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.map(|row| {
                let (schedule, project) = row?;
                Ok(DueSchedule {
                    schedule: from_json(&schedule)?,
                    project: from_json(&project)?,
                })
            })
            .collect()
        })
        .await
    }

    async fn claim_schedule(
        &self,
        id: &str,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let id = id.to_string();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let data: Option<String> = tx
                .query_row(
                    "SELECT data FROM schedules WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(data) = data else {
                return Ok(false);
            };

            let mut schedule: Schedule = from_json(&data)?;
            if !schedule.is_active || schedule.is_claimed(now) {
                return Ok(false);
            }

            schedule.claimed_until = Some(until);
            ScheduleRow::from_schedule(&schedule)?.update(&tx)?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::ProjectRepository;
    use crate::domain::{Project, TimeOfDay};
    use chrono::{Duration, TimeZone};

    async fn seeded() -> (SqliteStore, Project) {
        let store = SqliteStore::in_memory().unwrap();
        let project = Project::new("tenant-a", "Site");
        store.create_project(&project).await.unwrap();
        (store, project)
    }

    fn schedule_at(project: &Project, next_run_at: DateTime<Utc>) -> Schedule {
        let mut schedule = Schedule::new(
            &project.tenant_id,
            &project.id,
            "Daily",
            TimeOfDay::new(9, 0).unwrap(),
        );
        schedule.next_run_at = next_run_at;
        schedule
    }

    #[tokio::test]
    async fn test_due_selection() {
        let (store, project) = seeded().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();

        let due = schedule_at(&project, now - Duration::hours(3));
        let exact = schedule_at(&project, now);
        let future = schedule_at(&project, now + Duration::minutes(1));
        let mut inactive = schedule_at(&project, now - Duration::hours(1));
        inactive.is_active = false;

        for s in [&due, &exact, &future, &inactive] {
            store.create_schedule(s).await.unwrap();
        }

        let selected = store.list_due_schedules(now).await.unwrap();
        let ids: Vec<_> = selected.iter().map(|d| d.schedule.id.clone()).collect();
        assert_eq!(ids, vec![due.id.clone(), exact.id.clone()]);
        assert_eq!(selected[0].project.id, project.id);
    }

    #[tokio::test]
    async fn test_claim_excludes_overlapping_runs() {
        let (store, project) = seeded().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let schedule = schedule_at(&project, now - Duration::minutes(5));
        store.create_schedule(&schedule).await.unwrap();

        let until = now + Duration::minutes(10);
        assert!(store.claim_schedule(&schedule.id, now, until).await.unwrap());
        assert!(!store.claim_schedule(&schedule.id, now, until).await.unwrap());
        assert!(store.list_due_schedules(now).await.unwrap().is_empty());

        // An expired lease can be taken over.
        let later = until + Duration::seconds(1);
        assert_eq!(store.list_due_schedules(later).await.unwrap().len(), 1);
        assert!(
            store
                .claim_schedule(&schedule.id, later, later + Duration::minutes(10))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_update_is_tenant_scoped() {
        let (store, project) = seeded().await;
        let mut schedule = schedule_at(&project, Utc::now());
        store.create_schedule(&schedule).await.unwrap();

        schedule.name = "Renamed".into();
        store.update_schedule(&schedule).await.unwrap();
        let loaded = store.get_schedule("tenant-a", &schedule.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");

        assert!(store.get_schedule("tenant-b", &schedule.id).await.unwrap().is_none());
        assert!(!store.delete_schedule("tenant-b", &schedule.id).await.unwrap());
        assert!(store.delete_schedule("tenant-a", &schedule.id).await.unwrap());
    }
}
