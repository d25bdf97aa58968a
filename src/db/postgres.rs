use anyhow::Context;
use async_trait::async_trait;
use sqlx::{error::ErrorKind, postgres::PgPoolOptions, PgPool};

use super::models::{CommentRow, PostRow};
use super::{
    Category, CommentView, ListParams, NewCategory, NewComment, NewPost, NewUser, Page, PostView,
    RepoError, RepoResult, Repository, User, UserChanges,
};

const USER_COLUMNS: &str = "id, username, email, password_hash";

const POST_COLUMNS: &str = r#"
    p.id, p.title, p.content, p.date_posted,
    p.category_id, c.name AS category_name,
    p.user_id, u.username AS author_username
"#;

const POST_JOINS: &str = r#"
    JOIN categories c ON c.id = p.category_id
    JOIN users u ON u.id = p.user_id
"#;

const POST_ORDER: &str = "ORDER BY p.date_posted DESC, p.id DESC";

const COMMENT_COLUMNS: &str = r#"
    m.id, m.body, m.date_posted,
    m.post_id, p.title AS post_title,
    m.user_id, u.username AS author_username
"#;

const COMMENT_JOINS: &str = r#"
    JOIN posts p ON p.id = m.post_id
    JOIN users u ON u.id = m.user_id
"#;

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    return RepoError::Unique {
                        field: constraint_field(db_err.constraint()),
                    }
                }
                ErrorKind::ForeignKeyViolation => {
                    return RepoError::ForeignKey {
                        field: constraint_field(db_err.constraint()),
                    }
                }
                _ => {}
            }
        }
        RepoError::Database(e)
    }
}

/// `users_username_key` -> `username`, `posts_category_id_fkey` -> `category_id`.
fn constraint_field(constraint: Option<&str>) -> String {
    constraint
        .map(|c| c.trim_end_matches("_fkey").trim_end_matches("_key"))
        .and_then(|c| c.split_once('_').map(|(_, field)| field.to_string()))
        .unwrap_or_else(|| "id".into())
}

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }

    async fn count(&self, sql: &str, pattern: Option<&str>) -> RepoResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(sql)
            .bind(pattern)
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn search_users(&self, params: &ListParams) -> RepoResult<Page<User>> {
        let pattern = params.like_pattern();
        let total = self
            .count(
                "SELECT COUNT(*) FROM users WHERE ($1::TEXT IS NULL OR username ILIKE $1)",
                pattern.as_deref(),
            )
            .await?;
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE ($1::TEXT IS NULL OR username ILIKE $1)
             ORDER BY id
             LIMIT $2 OFFSET $3
            "#
        );
        let items = sqlx::query_as::<_, User>(&sql)
            .bind(pattern.as_deref())
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(Page {
            items,
            total,
            limit: params.limit,
            offset: params.offset,
        })
    }

    async fn create_user(&self, new: &NewUser) -> RepoResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> RepoResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
               SET username = $2,
                   email = $3,
                   password_hash = COALESCE($4, password_hash)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&changes.username)
            .bind(&changes.email)
            .bind(changes.password_hash.as_deref())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::from(e).restricted("user"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name, description FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_category(&self, id: i64) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, name, description FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, name, description FROM categories WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn search_categories(&self, params: &ListParams) -> RepoResult<Page<Category>> {
        let pattern = params.like_pattern();
        let total = self
            .count(
                "SELECT COUNT(*) FROM categories WHERE ($1::TEXT IS NULL OR name ILIKE $1)",
                pattern.as_deref(),
            )
            .await?;
        let items = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description
              FROM categories
             WHERE ($1::TEXT IS NULL OR name ILIKE $1)
             ORDER BY id
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(pattern.as_deref())
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page {
            items,
            total,
            limit: params.limit,
            offset: params.offset,
        })
    }

    async fn create_category(&self, new: &NewCategory) -> RepoResult<Category> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description
            "#,
        )
        .bind(&new.name)
        .bind(new.description.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_category(
        &self,
        id: i64,
        changes: &NewCategory,
    ) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
               SET name = $2, description = $3
             WHERE id = $1
            RETURNING id, name, description
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(changes.description.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::from(e).restricted("category"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_posts(&self, category_id: Option<i64>) -> RepoResult<Vec<PostView>> {
        let sql = format!(
            r#"
            SELECT {POST_COLUMNS}
              FROM posts p
              {POST_JOINS}
             WHERE ($1::BIGINT IS NULL OR p.category_id = $1)
             {POST_ORDER}
            "#
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PostView::from).collect())
    }

    async fn find_post(&self, id: i64) -> RepoResult<Option<PostView>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p {POST_JOINS} WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PostView::from))
    }

    async fn search_posts(&self, params: &ListParams) -> RepoResult<Page<PostView>> {
        let pattern = params.like_pattern();
        let total = self
            .count(
                "SELECT COUNT(*) FROM posts WHERE ($1::TEXT IS NULL OR title ILIKE $1)",
                pattern.as_deref(),
            )
            .await?;
        let sql = format!(
            r#"
            SELECT {POST_COLUMNS}
              FROM posts p
              {POST_JOINS}
             WHERE ($1::TEXT IS NULL OR p.title ILIKE $1)
             {POST_ORDER}
             LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(pattern.as_deref())
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(Page {
            items: rows.into_iter().map(PostView::from).collect(),
            total,
            limit: params.limit,
            offset: params.offset,
        })
    }

    async fn create_post(&self, new: &NewPost) -> RepoResult<PostView> {
        let sql = format!(
            r#"
            WITH p AS (
                INSERT INTO posts (title, content, category_id, user_id)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p {POST_JOINS}
            "#
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(&new.title)
            .bind(&new.content)
            .bind(new.category_id)
            .bind(new.user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn update_post(&self, id: i64, changes: &NewPost) -> RepoResult<Option<PostView>> {
        let sql = format!(
            r#"
            WITH p AS (
                UPDATE posts
                   SET title = $2, content = $3, category_id = $4, user_id = $5
                 WHERE id = $1
                RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p {POST_JOINS}
            "#
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.content)
            .bind(changes.category_id)
            .bind(changes.user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PostView::from))
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_comments_for_post(&self, post_id: i64) -> RepoResult<Vec<CommentView>> {
        let sql = format!(
            r#"
            SELECT {COMMENT_COLUMNS}
              FROM comments m
              {COMMENT_JOINS}
             WHERE m.post_id = $1
             ORDER BY m.date_posted DESC, m.id ASC
            "#
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(CommentView::from).collect())
    }

    async fn find_comment(&self, id: i64) -> RepoResult<Option<CommentView>> {
        let sql =
            format!("SELECT {COMMENT_COLUMNS} FROM comments m {COMMENT_JOINS} WHERE m.id = $1");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CommentView::from))
    }

    async fn search_comments(&self, params: &ListParams) -> RepoResult<Page<CommentView>> {
        let pattern = params.like_pattern();
        let total = self
            .count(
                "SELECT COUNT(*) FROM comments WHERE ($1::TEXT IS NULL OR body ILIKE $1)",
                pattern.as_deref(),
            )
            .await?;
        let sql = format!(
            r#"
            SELECT {COMMENT_COLUMNS}
              FROM comments m
              {COMMENT_JOINS}
             WHERE ($1::TEXT IS NULL OR m.body ILIKE $1)
             ORDER BY m.date_posted DESC, m.id DESC
             LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(pattern.as_deref())
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(Page {
            items: rows.into_iter().map(CommentView::from).collect(),
            total,
            limit: params.limit,
            offset: params.offset,
        })
    }

    async fn create_comment(&self, new: &NewComment) -> RepoResult<CommentView> {
        let sql = format!(
            r#"
            WITH m AS (
                INSERT INTO comments (body, post_id, user_id)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT {COMMENT_COLUMNS} FROM m {COMMENT_JOINS}
            "#
        );
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(&new.body)
            .bind(new.post_id)
            .bind(new.user_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_comment(
        &self,
        id: i64,
        changes: &NewComment,
    ) -> RepoResult<Option<CommentView>> {
        let sql = format!(
            r#"
            WITH m AS (
                UPDATE comments
                   SET body = $2, post_id = $3, user_id = $4
                 WHERE id = $1
                RETURNING *
            )
            SELECT {COMMENT_COLUMNS} FROM m {COMMENT_JOINS}
            "#
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .bind(&changes.body)
            .bind(changes.post_id)
            .bind(changes.user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CommentView::from))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_names_map_to_fields() {
        assert_eq!(constraint_field(Some("users_username_key")), "username");
        assert_eq!(constraint_field(Some("users_email_key")), "email");
        assert_eq!(constraint_field(Some("categories_name_key")), "name");
        assert_eq!(constraint_field(Some("posts_category_id_fkey")), "category_id");
        assert_eq!(constraint_field(None), "id");
    }

    #[test]
    fn restricted_only_rewrites_foreign_keys() {
        let err = RepoError::ForeignKey {
            field: "user_id".into(),
        }
        .restricted("user");
        assert!(matches!(err, RepoError::InUse("user")));

        let err = RepoError::Unique {
            field: "name".into(),
        }
        .restricted("category");
        assert!(matches!(err, RepoError::Unique { .. }));
    }

    // Live tests: `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`
    mod live {
        use super::super::*;
        use rand::Rng;

        async fn repo() -> Option<PgRepository> {
            let url = std::env::var("TEST_DATABASE_URL").ok()?;
            let repo = PgRepository::connect(&url).await.expect("connect");
            repo.migrate().await.expect("migrate");
            Some(repo)
        }

        fn suffix() -> String {
            format!("{:08x}", rand::thread_rng().gen::<u32>())
        }

        async fn seed(repo: &PgRepository, tag: &str) -> (User, Category, PostView) {
            let user = repo
                .create_user(&NewUser {
                    username: format!("reader-{tag}"),
                    email: format!("reader-{tag}@example.com"),
                    password_hash: "hash".into(),
                })
                .await
                .unwrap();
            let category = repo
                .create_category(&NewCategory {
                    name: format!("World-{tag}"),
                    description: None,
                })
                .await
                .unwrap();
            let post = repo
                .create_post(&NewPost {
                    title: format!("Headline {tag}"),
                    content: "body".into(),
                    category_id: category.id,
                    user_id: user.id,
                })
                .await
                .unwrap();
            (user, category, post)
        }

        async fn cleanup(repo: &PgRepository, user: &User, category: &Category, post: &PostView) {
            repo.delete_post(post.id).await.unwrap();
            repo.delete_category(category.id).await.unwrap();
            repo.delete_user(user.id).await.unwrap();
        }

        #[tokio::test]
        #[ignore]
        async fn comments_order_newest_first_then_by_id() {
            let Some(repo) = repo().await else { return };
            let tag = suffix();
            let (user, category, post) = seed(&repo, &tag).await;

            let mut ids = Vec::new();
            for body in ["first", "second", "third"] {
                let c = repo
                    .create_comment(&NewComment {
                        body: body.into(),
                        post_id: post.id,
                        user_id: user.id,
                    })
                    .await
                    .unwrap();
                assert_eq!(c.post_title, post.title);
                assert_eq!(c.author.username, user.username);
                ids.push(c.id);
            }
            sqlx::query(
                "UPDATE comments SET date_posted = (SELECT date_posted FROM comments WHERE id = $1) WHERE id = $2",
            )
            .bind(ids[0])
            .bind(ids[1])
            .execute(&repo.pool)
            .await
            .unwrap();

            let bodies: Vec<String> = repo
                .list_comments_for_post(post.id)
                .await
                .unwrap()
                .into_iter()
                .map(|c| c.body)
                .collect();
            assert_eq!(bodies, ["third", "first", "second"]);

            cleanup(&repo, &user, &category, &post).await;
        }

        #[tokio::test]
        #[ignore]
        async fn constraint_violations_map_to_repo_errors() {
            let Some(repo) = repo().await else { return };
            let tag = suffix();
            let (user, category, post) = seed(&repo, &tag).await;

            let err = repo
                .create_category(&NewCategory {
                    name: category.name.clone(),
                    description: None,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, RepoError::Unique { ref field } if field == "name"));

            let err = repo.delete_category(category.id).await.unwrap_err();
            assert!(matches!(err, RepoError::InUse("category")));
            let err = repo.delete_user(user.id).await.unwrap_err();
            assert!(matches!(err, RepoError::InUse("user")));

            let err = repo
                .create_post(&NewPost {
                    title: "orphan".into(),
                    content: "x".into(),
                    category_id: -1,
                    user_id: user.id,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, RepoError::ForeignKey { ref field } if field == "category_id"));

            cleanup(&repo, &user, &category, &post).await;
        }

        #[tokio::test]
        #[ignore]
        async fn search_is_case_insensitive() {
            let Some(repo) = repo().await else { return };
            let tag = suffix();
            let (user, category, post) = seed(&repo, &tag).await;

            let page = repo
                .search_posts(&ListParams {
                    q: Some(format!("HEADLINE {}", tag.to_uppercase())),
                    limit: 10,
                    offset: 0,
                })
                .await
                .unwrap();
            assert_eq!(page.total, 1);
            assert_eq!(page.items[0].id, post.id);
            assert_eq!(page.items[0].category.name, category.name);

            cleanup(&repo, &user, &category, &post).await;
        }
    }
}
