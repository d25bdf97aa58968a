//! In-process repository. Enforces the same unique, foreign-key and delete rules
//! as the Postgres schema. Data is lost on restart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use super::models::{AuthorRef, CategoryRef, Comment, Post};
use super::{
    Category, CommentView, ListParams, NewCategory, NewComment, NewPost, NewUser, Page, PostView,
    RepoError, RepoResult, Repository, User, UserChanges,
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    categories: BTreeMap<i64, Category>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    user_seq: i64,
    category_seq: i64,
    post_seq: i64,
    comment_seq: i64,
    last_stamp: Option<OffsetDateTime>,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

fn unique(field: &str) -> RepoError {
    RepoError::Unique {
        field: field.to_string(),
    }
}

fn dangling(field: &str) -> RepoError {
    RepoError::ForeignKey {
        field: field.to_string(),
    }
}

impl Tables {
    /// Strictly increasing insert time, so "most recent" is never ambiguous.
    fn stamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn check_user_unique(&self, username: &str, email: &str, except: Option<i64>) -> RepoResult<()> {
        for u in self.users.values().filter(|u| Some(u.id) != except) {
            if u.username == username {
                return Err(unique("username"));
            }
            if u.email == email {
                return Err(unique("email"));
            }
        }
        Ok(())
    }

    fn check_category_unique(&self, name: &str, except: Option<i64>) -> RepoResult<()> {
        if self
            .categories
            .values()
            .any(|c| c.name == name && Some(c.id) != except)
        {
            return Err(unique("name"));
        }
        Ok(())
    }

    fn check_post_refs(&self, p: &NewPost) -> RepoResult<()> {
        if !self.categories.contains_key(&p.category_id) {
            return Err(dangling("category_id"));
        }
        if !self.users.contains_key(&p.user_id) {
            return Err(dangling("user_id"));
        }
        Ok(())
    }

    fn check_comment_refs(&self, c: &NewComment) -> RepoResult<()> {
        if !self.posts.contains_key(&c.post_id) {
            return Err(dangling("post_id"));
        }
        if !self.users.contains_key(&c.user_id) {
            return Err(dangling("user_id"));
        }
        Ok(())
    }

    fn author(&self, user_id: i64) -> Option<AuthorRef> {
        self.users.get(&user_id).map(|u| AuthorRef {
            id: u.id,
            username: u.username.clone(),
        })
    }

    fn post_view(&self, p: &Post) -> Option<PostView> {
        let category = self.categories.get(&p.category_id)?;
        Some(PostView {
            id: p.id,
            title: p.title.clone(),
            content: p.content.clone(),
            date_posted: p.date_posted,
            category: CategoryRef {
                id: category.id,
                name: category.name.clone(),
            },
            author: self.author(p.user_id)?,
        })
    }

    fn comment_view(&self, c: &Comment) -> Option<CommentView> {
        let post = self.posts.get(&c.post_id)?;
        Some(CommentView {
            id: c.id,
            body: c.body.clone(),
            date_posted: c.date_posted,
            post_id: post.id,
            post_title: post.title.clone(),
            author: self.author(c.user_id)?,
        })
    }

    /// Newest first, ties broken by newest id.
    fn posts_sorted<'a>(&'a self, keep: impl Fn(&Post) -> bool) -> Vec<PostView> {
        let mut posts: Vec<&'a Post> = self.posts.values().filter(|p| keep(p)).collect();
        posts.sort_by(|a, b| b.date_posted.cmp(&a.date_posted).then(b.id.cmp(&a.id)));
        posts.into_iter().filter_map(|p| self.post_view(p)).collect()
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn search_users(&self, params: &ListParams) -> RepoResult<Page<User>> {
        let t = self.tables.read().await;
        let all = t
            .users
            .values()
            .filter(|u| params.matches(&u.username))
            .cloned()
            .collect();
        Ok(Page::from_filtered(all, params))
    }

    async fn create_user(&self, new: &NewUser) -> RepoResult<User> {
        let mut t = self.tables.write().await;
        t.check_user_unique(&new.username, &new.email, None)?;
        let user = User {
            id: next(&mut t.user_seq),
            username: new.username.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> RepoResult<Option<User>> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&id) {
            return Ok(None);
        }
        t.check_user_unique(&changes.username, &changes.email, Some(id))?;
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(None);
        };
        user.username = changes.username.clone();
        user.email = changes.email.clone();
        if let Some(hash) = &changes.password_hash {
            user.password_hash = hash.clone();
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        let referenced = t.posts.values().any(|p| p.user_id == id)
            || t.comments.values().any(|c| c.user_id == id);
        if referenced {
            return Err(RepoError::InUse("user"));
        }
        Ok(t.users.remove(&id).is_some())
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let t = self.tables.read().await;
        let mut all: Vec<Category> = t.categories.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn find_category(&self, id: i64) -> RepoResult<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>> {
        let t = self.tables.read().await;
        Ok(t.categories.values().find(|c| c.name == name).cloned())
    }

    async fn search_categories(&self, params: &ListParams) -> RepoResult<Page<Category>> {
        let t = self.tables.read().await;
        let all = t
            .categories
            .values()
            .filter(|c| params.matches(&c.name))
            .cloned()
            .collect();
        Ok(Page::from_filtered(all, params))
    }

    async fn create_category(&self, new: &NewCategory) -> RepoResult<Category> {
        let mut t = self.tables.write().await;
        t.check_category_unique(&new.name, None)?;
        let category = Category {
            id: next(&mut t.category_seq),
            name: new.name.clone(),
            description: new.description.clone(),
        };
        t.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: i64,
        changes: &NewCategory,
    ) -> RepoResult<Option<Category>> {
        let mut t = self.tables.write().await;
        if !t.categories.contains_key(&id) {
            return Ok(None);
        }
        t.check_category_unique(&changes.name, Some(id))?;
        let Some(category) = t.categories.get_mut(&id) else {
            return Ok(None);
        };
        category.name = changes.name.clone();
        category.description = changes.description.clone();
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        if t.posts.values().any(|p| p.category_id == id) {
            return Err(RepoError::InUse("category"));
        }
        Ok(t.categories.remove(&id).is_some())
    }

    async fn list_posts(&self, category_id: Option<i64>) -> RepoResult<Vec<PostView>> {
        let t = self.tables.read().await;
        Ok(t.posts_sorted(|p| category_id.map_or(true, |id| p.category_id == id)))
    }

    async fn find_post(&self, id: i64) -> RepoResult<Option<PostView>> {
        let t = self.tables.read().await;
        Ok(t.posts.get(&id).and_then(|p| t.post_view(p)))
    }

    async fn search_posts(&self, params: &ListParams) -> RepoResult<Page<PostView>> {
        let t = self.tables.read().await;
        let all = t.posts_sorted(|p| params.matches(&p.title));
        Ok(Page::from_filtered(all, params))
    }

    async fn create_post(&self, new: &NewPost) -> RepoResult<PostView> {
        let mut t = self.tables.write().await;
        t.check_post_refs(new)?;
        let post = Post {
            id: next(&mut t.post_seq),
            title: new.title.clone(),
            content: new.content.clone(),
            date_posted: t.stamp(),
            category_id: new.category_id,
            user_id: new.user_id,
        };
        t.posts.insert(post.id, post.clone());
        t.post_view(&post).ok_or_else(|| dangling("category_id"))
    }

    async fn update_post(&self, id: i64, changes: &NewPost) -> RepoResult<Option<PostView>> {
        let mut t = self.tables.write().await;
        if !t.posts.contains_key(&id) {
            return Ok(None);
        }
        t.check_post_refs(changes)?;
        let Some(post) = t.posts.get_mut(&id) else {
            return Ok(None);
        };
        post.title = changes.title.clone();
        post.content = changes.content.clone();
        post.category_id = changes.category_id;
        post.user_id = changes.user_id;
        let post = post.clone();
        Ok(t.post_view(&post))
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        let removed = t.posts.remove(&id).is_some();
        if removed {
            t.comments.retain(|_, c| c.post_id != id);
        }
        Ok(removed)
    }

    async fn list_comments_for_post(&self, post_id: i64) -> RepoResult<Vec<CommentView>> {
        let t = self.tables.read().await;
        let mut comments: Vec<&Comment> =
            t.comments.values().filter(|c| c.post_id == post_id).collect();
        comments.sort_by(|a, b| b.date_posted.cmp(&a.date_posted).then(a.id.cmp(&b.id)));
        Ok(comments
            .into_iter()
            .filter_map(|c| t.comment_view(c))
            .collect())
    }

    async fn find_comment(&self, id: i64) -> RepoResult<Option<CommentView>> {
        let t = self.tables.read().await;
        Ok(t.comments.get(&id).and_then(|c| t.comment_view(c)))
    }

    async fn search_comments(&self, params: &ListParams) -> RepoResult<Page<CommentView>> {
        let t = self.tables.read().await;
        let mut comments: Vec<&Comment> = t
            .comments
            .values()
            .filter(|c| params.matches(&c.body))
            .collect();
        comments.sort_by(|a, b| b.date_posted.cmp(&a.date_posted).then(b.id.cmp(&a.id)));
        let all = comments
            .into_iter()
            .filter_map(|c| t.comment_view(c))
            .collect();
        Ok(Page::from_filtered(all, params))
    }

    async fn create_comment(&self, new: &NewComment) -> RepoResult<CommentView> {
        let mut t = self.tables.write().await;
        t.check_comment_refs(new)?;
        let comment = Comment {
            id: next(&mut t.comment_seq),
            body: new.body.clone(),
            date_posted: t.stamp(),
            user_id: new.user_id,
            post_id: new.post_id,
        };
        t.comments.insert(comment.id, comment.clone());
        t.comment_view(&comment).ok_or_else(|| dangling("post_id"))
    }

    async fn update_comment(
        &self,
        id: i64,
        changes: &NewComment,
    ) -> RepoResult<Option<CommentView>> {
        let mut t = self.tables.write().await;
        if !t.comments.contains_key(&id) {
            return Ok(None);
        }
        t.check_comment_refs(changes)?;
        let Some(comment) = t.comments.get_mut(&id) else {
            return Ok(None);
        };
        comment.body = changes.body.clone();
        comment.post_id = changes.post_id;
        comment.user_id = changes.user_id;
        let comment = comment.clone();
        Ok(t.comment_view(&comment))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryRepository, User, Category) {
        let repo = MemoryRepository::new();
        let user = repo
            .create_user(&NewUser {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        let category = repo
            .create_category(&NewCategory {
                name: "World".into(),
                description: None,
            })
            .await
            .unwrap();
        (repo, user, category)
    }

    fn new_post(category: &Category, user: &User, title: &str) -> NewPost {
        NewPost {
            title: title.into(),
            content: format!("{title} body"),
            category_id: category.id,
            user_id: user.id,
        }
    }

    #[tokio::test]
    async fn duplicate_category_name_leaves_one_row() {
        let (repo, _, _) = seeded().await;
        let err = repo
            .create_category(&NewCategory {
                name: "World".into(),
                description: Some("again".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Unique { ref field } if field == "name"));

        let all = repo.list_categories().await.unwrap();
        assert_eq!(all.iter().filter(|c| c.name == "World").count(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_and_email_rejected() {
        let (repo, _, _) = seeded().await;
        let err = repo
            .create_user(&NewUser {
                username: "alice".into(),
                email: "other@example.com".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Unique { ref field } if field == "username"));

        let err = repo
            .create_user(&NewUser {
                username: "bob".into(),
                email: "alice@example.com".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Unique { ref field } if field == "email"));
    }

    #[tokio::test]
    async fn post_with_unknown_category_is_rejected() {
        let (repo, user, _) = seeded().await;
        let err = repo
            .create_post(&NewPost {
                title: "t".into(),
                content: "c".into(),
                category_id: 999,
                user_id: user.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::ForeignKey { ref field } if field == "category_id"));
        assert!(repo.list_posts(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_policy_restricts_and_cascades() {
        let (repo, user, category) = seeded().await;
        let post = repo.create_post(&new_post(&category, &user, "Hello")).await.unwrap();
        repo.create_comment(&NewComment {
            body: "first".into(),
            post_id: post.id,
            user_id: user.id,
        })
        .await
        .unwrap();

        assert!(matches!(
            repo.delete_category(category.id).await,
            Err(RepoError::InUse("category"))
        ));
        assert!(matches!(
            repo.delete_user(user.id).await,
            Err(RepoError::InUse("user"))
        ));

        assert!(repo.delete_post(post.id).await.unwrap());
        let page = repo
            .search_comments(&ListParams {
                q: None,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        assert!(repo.delete_category(category.id).await.unwrap());
        assert!(repo.delete_user(user.id).await.unwrap());
        assert!(!repo.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn comments_newest_first() {
        let (repo, user, category) = seeded().await;
        let post = repo.create_post(&new_post(&category, &user, "Hello")).await.unwrap();
        for body in ["one", "two", "three"] {
            repo.create_comment(&NewComment {
                body: body.into(),
                post_id: post.id,
                user_id: user.id,
            })
            .await
            .unwrap();
        }
        let bodies: Vec<String> = repo
            .list_comments_for_post(post.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.body)
            .collect();
        assert_eq!(bodies, vec!["three", "two", "one"]);
    }

    #[tokio::test]
    async fn update_user_keeps_hash_when_absent() {
        let (repo, user, _) = seeded().await;
        let updated = repo
            .update_user(
                user.id,
                &UserChanges {
                    username: "alice2".into(),
                    email: "alice2@example.com".into(),
                    password_hash: None,
                },
            )
            .await
            .unwrap()
            .expect("user exists");
        assert_eq!(updated.username, "alice2");
        assert_eq!(updated.password_hash, "hash");
        assert!(repo
            .update_user(
                42,
                &UserChanges {
                    username: "x".into(),
                    email: "x@example.com".into(),
                    password_hash: None,
                }
            )
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn comments_sharing_a_timestamp_keep_insertion_order() {
        let (repo, user, category) = seeded().await;
        let post = repo.create_post(&new_post(&category, &user, "Tie")).await.unwrap();
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
            ids.push(c.id);
        }
        {
            let mut t = repo.tables.write().await;
            let shared = t.comments[&ids[0]].date_posted;
            for id in &ids[..2] {
                t.comments.get_mut(id).unwrap().date_posted = shared;
            }
        }

        let bodies: Vec<String> = repo
            .list_comments_for_post(post.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.body)
            .collect();
        assert_eq!(bodies, ["third", "first", "second"]);
    }
}
