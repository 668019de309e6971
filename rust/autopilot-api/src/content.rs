//! Content service: generate article content and publish it.
//!
//! Both the tenant endpoints and the internal loopback endpoints the run
//! executor calls go through [`ContentService`].

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::config::CreditsConfig;
use crate::database::{ArticleRepository, ContentRepository, ProjectRepository};
use crate::domain::{Article, ArticleStatus, Content, Project, PublishOutcome, TransactionType};
use crate::error::{AppError, AppResult};
use crate::ledger::CreditLedger;
use crate::llm::{LlmDriver, build_article_prompt, parse_generated_article};
use crate::publish::{SocialPost, SocialPublisher, WordPressPost, WordPressPublisher};

#[derive(Clone)]
pub struct ContentService {
    projects: Arc<dyn ProjectRepository>,
    articles: Arc<dyn ArticleRepository>,
    contents: Arc<dyn ContentRepository>,
    ledger: CreditLedger,
    llm: Arc<dyn LlmDriver>,
    wordpress: Arc<dyn WordPressPublisher>,
    social: Arc<dyn SocialPublisher>,
    costs: CreditsConfig,
    stale_writing_after: chrono::Duration,
}

impl std::fmt::Debug for ContentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentService")
            .field("model", &self.llm.model())
            .field("costs", &self.costs)
            .finish_non_exhaustive()
    }
}

/// Dependencies of a [`ContentService`].
pub struct ContentServiceParts {
    pub projects: Arc<dyn ProjectRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub contents: Arc<dyn ContentRepository>,
    pub ledger: CreditLedger,
    pub llm: Arc<dyn LlmDriver>,
    pub wordpress: Arc<dyn WordPressPublisher>,
    pub social: Arc<dyn SocialPublisher>,
    pub costs: CreditsConfig,
    /// How long an article may sit in `writing` before another generate
    /// may take it over.
    pub stale_writing_after: chrono::Duration,
}

impl ContentService {
    pub fn new(parts: ContentServiceParts) -> Self {
        let ContentServiceParts {
            projects,
            articles,
            contents,
            ledger,
            llm,
            wordpress,
            social,
            costs,
            stale_writing_after,
        } = parts;
        Self {
            projects,
            articles,
            contents,
            ledger,
            llm,
            wordpress,
            social,
            costs,
            stale_writing_after,
        }
    }

    async fn project(&self, tenant_id: &str, project_id: &str) -> AppResult<Project> {
        self.projects
            .get_project(tenant_id, project_id)
            .await?
            .ok_or(AppError::NotFound("Project"))
    }

    /// Generate content for an article of `project_id`.
    ///
    /// The article moves to `writing`, then to `completed` with the new
    /// content id, or to `failed` with the error. If the caller drops the
    /// future midway the article is still marked `failed`.
    pub async fn generate(
        &self,
        tenant_id: &str,
        article_id: &str,
        project_id: &str,
    ) -> AppResult<Content> {
        let project = self.project(tenant_id, project_id).await?;
        let mut article = self
            .articles
            .get_article(tenant_id, article_id)
            .await?
            .filter(|a| a.project_id == project.id)
            .ok_or(AppError::NotFound("Article"))?;

        article.start_writing_at(Utc::now(), self.stale_writing_after)?;
        self.articles.update_article(&article).await?;
        let mut guard = WritingGuard::new(Arc::clone(&self.articles), &article);

        let started = Instant::now();
        let result = self.write_and_store(&project, &mut article).await;
        if let Err(e) = &result {
            self.mark_failed(&mut article, e).await;
        }
        guard.disarm();
        let content = result?;

        tracing::info!(
            tenant_id = %tenant_id,
            article_id = %article.id,
            content_id = %content.id,
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Article content generated"
        );
        Ok(content)
    }

    /// Everything after the article entered `writing`. On error `article`
    /// is still in `writing`.
    async fn write_and_store(&self, project: &Project, article: &mut Article) -> AppResult<Content> {
        let generated = self.write_article(project, article).await?;
        let content = Content::new(&article.tenant_id, &project.id, &article.id, generated);
        self.contents.create_content(&content).await?;

        let mut completed = article.clone();
        completed.complete(&content.id)?;
        self.articles.update_article(&completed).await?;
        *article = completed;
        Ok(content)
    }

    async fn write_article(
        &self,
        project: &Project,
        article: &Article,
    ) -> AppResult<crate::domain::GeneratedArticle> {
        let messages = build_article_prompt(project, article);
        let reply = self.llm.complete(&messages).await?;
        Ok(parse_generated_article(&reply)?)
    }

    async fn mark_failed(&self, article: &mut Article, error: &AppError) {
        if let Err(e) = article.fail(error.to_string()) {
            tracing::warn!(article_id = %article.id, error = %e, "Could not mark article failed");
            return;
        }
        if let Err(e) = self.articles.update_article(article).await {
            tracing::error!(article_id = %article.id, error = ?e, "Failed to store article failure");
        }
    }

    /// Credits needed to publish to the given targets.
    pub fn publish_cost(&self, project: &Project, platforms: &[String]) -> i64 {
        let wordpress = if project.has_wordpress() {
            self.costs.publish_cost
        } else {
            0
        };
        let social = if project.has_social() {
            self.costs
                .social_post_cost
                .saturating_mul(i64::try_from(platforms.len()).unwrap_or(i64::MAX))
        } else {
            0
        };
        wordpress.saturating_add(social)
    }

    /// Publish content to the project's WordPress site and social platforms.
    ///
    /// Credits are checked up front and the full cost is debited once when at
    /// least one target accepted the post.
    pub async fn publish(
        &self,
        tenant_id: &str,
        content_id: &str,
        project_id: &str,
        platforms: &[String],
    ) -> AppResult<PublishOutcome> {
        let project = self.project(tenant_id, project_id).await?;
        let mut content = self
            .contents
            .get_content(tenant_id, content_id)
            .await?
            .filter(|c| c.project_id == project.id)
            .ok_or(AppError::NotFound("Content"))?;

        let social_profile = project
            .social_profile_key
            .as_deref()
            .filter(|key| !key.is_empty() && !platforms.is_empty());
        if project.wordpress.is_none() && social_profile.is_none() {
            return Err(AppError::Validation(
                "Project has no WordPress site or social platforms to publish to".to_string(),
            ));
        }

        let cost = self.publish_cost(&project, platforms);
        if cost > 0 {
            self.ledger.ensure_available(tenant_id, cost).await?;
        }

        let mut outcome = PublishOutcome::default();

        if let Some(credentials) = &project.wordpress {
            let post = WordPressPost {
                title: content.title.clone(),
                content: content.html.clone(),
                excerpt: content.excerpt.clone(),
                status: "publish".to_string(),
            };
            match self.wordpress.create_post(credentials, &post).await {
                Ok(published) => {
                    content.wordpress_post_id = Some(published.id);
                    content.wordpress_url = Some(published.link.clone());
                    content.updated_at = chrono::Utc::now();
                    outcome.wordpress_url = Some(published.link);
                }
                Err(e) => {
                    tracing::warn!(content_id = %content.id, error = %e, "WordPress publish failed");
                    outcome.wordpress_error = Some(e.to_string());
                }
            }
        }

        if let Some(profile_key) = social_profile {
            let text = match &outcome.wordpress_url {
                Some(url) => format!("{}\n\n{url}", content.title),
                None => content.title.clone(),
            };
            let post = SocialPost {
                post: text,
                platforms: platforms.to_vec(),
            };
            match self.social.post(profile_key, &post).await {
                Ok(result) => {
                    outcome.platform_statuses = result.statuses;
                    outcome.platform_errors = result.errors;
                }
                Err(e) => {
                    tracing::warn!(content_id = %content.id, error = %e, "Social publish failed");
                    for platform in platforms {
                        outcome
                            .platform_statuses
                            .insert(platform.clone(), "failed".to_string());
                        outcome.platform_errors.insert(platform.clone(), e.to_string());
                    }
                }
            }
        }

        if !outcome.any_succeeded() {
            return Ok(outcome);
        }

        if cost > 0 {
            let tx = self
                .ledger
                .debit(
                    tenant_id,
                    cost,
                    TransactionType::Usage,
                    &format!("Published '{}'", content.title),
                )
                .await?;
            outcome.credits_charged = cost;
            outcome.balance_after = Some(tx.balance_after);
        }

        if outcome.wordpress_url.is_some() {
            self.contents.update_content(&content).await?;
            self.mark_published(tenant_id, &content.article_id).await?;
        }

        tracing::info!(
            tenant_id = %tenant_id,
            content_id = %content.id,
            credits_charged = outcome.credits_charged,
            all_succeeded = outcome.all_succeeded(),
            "Content published"
        );
        Ok(outcome)
    }

    async fn mark_published(&self, tenant_id: &str, article_id: &str) -> AppResult<()> {
        let Some(mut article) = self.articles.get_article(tenant_id, article_id).await? else {
            return Ok(());
        };
        if article.status == ArticleStatus::Published {
            return Ok(());
        }
        article.transition(ArticleStatus::Published)?;
        self.articles.update_article(&article).await?;
        Ok(())
    }
}

/// Marks an article `failed` if generation is abandoned while it is in
/// `writing`.
struct WritingGuard {
    articles: Arc<dyn ArticleRepository>,
    article: Option<Article>,
}

impl WritingGuard {
    fn new(articles: Arc<dyn ArticleRepository>, article: &Article) -> Self {
        Self {
            articles,
            article: Some(article.clone()),
        }
    }

    fn disarm(&mut self) {
        self.article = None;
    }
}

impl Drop for WritingGuard {
    fn drop(&mut self) {
        let Some(mut article) = self.article.take() else {
            return;
        };
        if article.fail("Generation was interrupted").is_err() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(article_id = %article.id, "No runtime to record interrupted generation");
            return;
        };
        let articles = Arc::clone(&self.articles);
        runtime.spawn(async move {
            match articles.update_article(&article).await {
                Ok(()) => tracing::warn!(article_id = %article.id, "Interrupted generation marked failed"),
                Err(e) => tracing::error!(
                    article_id = %article.id,
                    error = ?e,
                    "Failed to store interrupted generation"
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{CreditRepository, SqliteStore};
    use crate::domain::{CreditGrant, WordPressCredentials};
    use crate::error::UpstreamError;
    use crate::llm::Message;
    use crate::publish::{PublishedPost, SocialPostResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    struct FakeLlm {
        reply: Result<String, u16>,
    }

    #[async_trait]
    impl LlmDriver for FakeLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, UpstreamError> {
            self.reply.clone().map_err(|status| UpstreamError::Http {
                service: "LLM",
                status,
                body: "overloaded".into(),
            })
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    /// Signals when called, then never answers.
    struct HangingLlm {
        called: Arc<Notify>,
    }

    #[async_trait]
    impl LlmDriver for HangingLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, UpstreamError> {
            self.called.notify_one();
            std::future::pending().await
        }

        fn model(&self) -> &str {
            "hanging"
        }
    }

    #[derive(Default)]
    struct FakeWordPress {
        fail: bool,
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WordPressPublisher for FakeWordPress {
        async fn create_post(
            &self,
            _credentials: &WordPressCredentials,
            post: &WordPressPost,
        ) -> Result<PublishedPost, UpstreamError> {
            if self.fail {
                return Err(UpstreamError::Http {
                    service: "WordPress",
                    status: 401,
                    body: "rest_cannot_create".into(),
                });
            }
            self.posts.lock().push(post.title.clone());
            Ok(PublishedPost {
                id: 7,
                link: "https://blog.example/?p=7".into(),
            })
        }
    }

    #[derive(Default)]
    struct FakeSocial {
        failing: Vec<String>,
    }

    #[async_trait]
    impl SocialPublisher for FakeSocial {
        async fn post(
            &self,
            _profile_key: &str,
            post: &SocialPost,
        ) -> Result<SocialPostResult, UpstreamError> {
            let mut result = SocialPostResult::default();
            for platform in &post.platforms {
                if self.failing.contains(platform) {
                    result.statuses.insert(platform.clone(), "failed".into());
                    result.errors.insert(platform.clone(), "token expired".into());
                } else {
                    result.statuses.insert(platform.clone(), "success".into());
                }
            }
            Ok(result)
        }
    }

    const GOOD_REPLY: &str = r#"{"title":"Pruning Roses","content":"<p>Cut.</p>","metaDescription":"How to prune"}"#;

    struct Fixture {
        store: SqliteStore,
        service: ContentService,
        project: Project,
        wordpress: Arc<FakeWordPress>,
    }

    async fn fixture(reply: Result<String, u16>, wordpress: FakeWordPress, social: FakeSocial) -> Fixture {
        let store = SqliteStore::in_memory().unwrap();
        let mut project = Project::new("t1", "Garden");
        project.wordpress = Some(WordPressCredentials {
            base_url: "https://blog.example".into(),
            username: "bot".into(),
            app_password: "pw".into(),
        });
        project.social_profile_key = Some("profile".into());
        store.create_project(&project).await.unwrap();

        let wordpress = Arc::new(wordpress);
        let service = service(&store, Arc::new(FakeLlm { reply }), wordpress.clone(), social);
        Fixture {
            store,
            service,
            project,
            wordpress,
        }
    }

    fn service(
        store: &SqliteStore,
        llm: Arc<dyn LlmDriver>,
        wordpress: Arc<FakeWordPress>,
        social: FakeSocial,
    ) -> ContentService {
        let repo = Arc::new(store.clone());
        ContentService::new(ContentServiceParts {
            projects: repo.clone(),
            articles: repo.clone(),
            contents: repo.clone(),
            ledger: CreditLedger::new(repo),
            llm,
            wordpress,
            social: Arc::new(social),
            costs: CreditsConfig {
                publish_cost: 10,
                social_post_cost: 2,
            },
            stale_writing_after: chrono::Duration::minutes(15),
        })
    }

    async fn fund(f: &Fixture, amount: i64) {
        let grant = CreditGrant {
            amount: Some(amount),
            transaction_type: TransactionType::Topup,
            description: "pack".into(),
            unlimited: None,
        };
        f.store.apply_grant("t1", &grant).await.unwrap();
    }

    async fn article(f: &Fixture) -> Article {
        let article = Article::new("t1", &f.project.id, "Pruning roses", "rose pruning");
        f.store.create_article(&article).await.unwrap();
        article
    }

    #[tokio::test]
    async fn test_generate_completes_article() {
        let f = fixture(Ok(GOOD_REPLY.into()), FakeWordPress::default(), FakeSocial::default()).await;
        let article = article(&f).await;

        let content = f.service.generate("t1", &article.id, &f.project.id).await.unwrap();
        assert_eq!(content.title, "Pruning Roses");
        assert_eq!(content.meta_description, "How to prune");

        let saved = f.store.get_article("t1", &article.id).await.unwrap().unwrap();
        assert_eq!(saved.status, ArticleStatus::Completed);
        assert_eq!(saved.content_id.as_deref(), Some(content.id.as_str()));
    }

    #[tokio::test]
    async fn test_generate_llm_failure_marks_article_failed() {
        let f = fixture(Err(503), FakeWordPress::default(), FakeSocial::default()).await;
        let article = article(&f).await;

        let err = f.service.generate("t1", &article.id, &f.project.id).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));

        let saved = f.store.get_article("t1", &article.id).await.unwrap().unwrap();
        assert_eq!(saved.status, ArticleStatus::Failed);
        assert!(saved.last_error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_generate_unparseable_reply() {
        let f = fixture(Ok("no json here".into()), FakeWordPress::default(), FakeSocial::default()).await;
        let article = article(&f).await;

        let err = f.service.generate("t1", &article.id, &f.project.id).await.unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
        let saved = f.store.get_article("t1", &article.id).await.unwrap().unwrap();
        assert_eq!(saved.status, ArticleStatus::Failed);
    }

    #[tokio::test]
    async fn test_generate_other_tenant_is_not_found() {
        let f = fixture(Ok(GOOD_REPLY.into()), FakeWordPress::default(), FakeSocial::default()).await;
        let article = article(&f).await;
        let err = f.service.generate("t2", &article.id, &f.project.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Project")));
    }

    #[tokio::test]
    async fn test_generate_while_writing_conflicts() {
        let f = fixture(Ok(GOOD_REPLY.into()), FakeWordPress::default(), FakeSocial::default()).await;
        let mut article = article(&f).await;
        article.start_writing().unwrap();
        f.store.update_article(&article).await.unwrap();

        let err = f.service.generate("t1", &article.id, &f.project.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_generate_reclaims_stale_writing() {
        let f = fixture(Ok(GOOD_REPLY.into()), FakeWordPress::default(), FakeSocial::default()).await;
        let mut article = article(&f).await;
        article.start_writing().unwrap();
        article.updated_at = Utc::now() - chrono::Duration::minutes(30);
        f.store.update_article(&article).await.unwrap();

        let content = f.service.generate("t1", &article.id, &f.project.id).await.unwrap();
        let saved = f.store.get_article("t1", &article.id).await.unwrap().unwrap();
        assert_eq!(saved.status, ArticleStatus::Completed);
        assert_eq!(saved.content_id, Some(content.id));
    }

    #[tokio::test]
    async fn test_abandoned_generate_marks_article_failed() {
        let f = fixture(Ok(GOOD_REPLY.into()), FakeWordPress::default(), FakeSocial::default()).await;
        let article = article(&f).await;
        let called = Arc::new(Notify::new());
        let hanging = service(
            &f.store,
            Arc::new(HangingLlm {
                called: Arc::clone(&called),
            }),
            f.wordpress.clone(),
            FakeSocial::default(),
        );

        tokio::select! {
            _ = hanging.generate("t1", &article.id, &f.project.id) => {
                panic!("generation should still be waiting on the LLM");
            }
            () = called.notified() => {}
        }

        let mut saved = None;
        for _ in 0..100 {
            let current = f.store.get_article("t1", &article.id).await.unwrap().unwrap();
            if current.status == ArticleStatus::Failed {
                saved = Some(current);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let saved = saved.expect("article should be marked failed");
        assert_eq!(saved.last_error.as_deref(), Some("Generation was interrupted"));

        let content = f.service.generate("t1", &article.id, &f.project.id).await.unwrap();
        let saved = f.store.get_article("t1", &article.id).await.unwrap().unwrap();
        assert_eq!(saved.status, ArticleStatus::Completed);
        assert_eq!(saved.content_id, Some(content.id));
    }

    #[tokio::test]
    async fn test_publish_charges_once_and_marks_published() {
        let f = fixture(
            Ok(GOOD_REPLY.into()),
            FakeWordPress::default(),
            FakeSocial {
                failing: vec!["linkedin".into()],
            },
        )
        .await;
        fund(&f, 20).await;
        let article = article(&f).await;
        let content = f.service.generate("t1", &article.id, &f.project.id).await.unwrap();

        let platforms = vec!["twitter".to_string(), "linkedin".to_string()];
        let outcome = f
            .service
            .publish("t1", &content.id, &f.project.id, &platforms)
            .await
            .unwrap();

        assert_eq!(outcome.wordpress_url.as_deref(), Some("https://blog.example/?p=7"));
        assert_eq!(outcome.platform_statuses["twitter"], "success");
        assert_eq!(outcome.platform_errors["linkedin"], "token expired");
        assert_eq!(outcome.credits_charged, 14);
        assert_eq!(outcome.balance_after, Some(6));

        let txs = f.store.list_transactions("t1", 10, 0).await.unwrap();
        assert_eq!(txs.iter().filter(|t| t.amount < 0).count(), 1);

        let saved = f.store.get_article("t1", &article.id).await.unwrap().unwrap();
        assert_eq!(saved.status, ArticleStatus::Published);
        let saved = f.store.get_content("t1", &content.id).await.unwrap().unwrap();
        assert_eq!(saved.wordpress_post_id, Some(7));
    }

    #[tokio::test]
    async fn test_publish_insufficient_credits_rejected_before_posting() {
        let f = fixture(Ok(GOOD_REPLY.into()), FakeWordPress::default(), FakeSocial::default()).await;
        fund(&f, 5).await;
        let article = article(&f).await;
        let content = f.service.generate("t1", &article.id, &f.project.id).await.unwrap();

        let err = f
            .service
            .publish("t1", &content.id, &f.project.id, &["twitter".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientCredits {
                required: 12,
                available: 5
            }
        ));
        assert!(f.wordpress.posts.lock().is_empty());
        assert_eq!(f.store.get_balance("t1").await.unwrap().available(), 5);
    }

    #[tokio::test]
    async fn test_publish_total_failure_charges_nothing() {
        let f = fixture(
            Ok(GOOD_REPLY.into()),
            FakeWordPress {
                fail: true,
                ..FakeWordPress::default()
            },
            FakeSocial::default(),
        )
        .await;
        fund(&f, 50).await;
        let article = article(&f).await;
        let content = f.service.generate("t1", &article.id, &f.project.id).await.unwrap();

        let outcome = f
            .service
            .publish("t1", &content.id, &f.project.id, &[])
            .await
            .unwrap();
        assert!(!outcome.any_succeeded());
        assert!(outcome.wordpress_error.unwrap().contains("401"));
        assert_eq!(outcome.credits_charged, 0);
        assert_eq!(f.store.get_balance("t1").await.unwrap().available(), 50);

        let saved = f.store.get_article("t1", &article.id).await.unwrap().unwrap();
        assert_eq!(saved.status, ArticleStatus::Completed);
    }

    #[tokio::test]
    async fn test_publish_cost_by_target() {
        let f = fixture(Ok(GOOD_REPLY.into()), FakeWordPress::default(), FakeSocial::default()).await;
        let three = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(f.service.publish_cost(&f.project, &three), 16);
        assert_eq!(f.service.publish_cost(&f.project, &[]), 10);

        let mut social_only = f.project.clone();
        social_only.wordpress = None;
        assert_eq!(f.service.publish_cost(&social_only, &three), 6);

        social_only.social_profile_key = None;
        assert_eq!(f.service.publish_cost(&social_only, &three), 0);
    }
}
